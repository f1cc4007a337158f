use irrisim::bus::{Broker, BusError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_connect_rejects_wrong_address() {
    let broker = Broker::new("mem://device");

    match broker.connect("mem://elsewhere") {
        Err(BusError::Connection(addr)) => assert_eq!(addr, "mem://elsewhere"),
        other => panic!("expected connection error, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_publish_reaches_subscriber() {
    let broker = Broker::new("mem://device");
    let subscriber = broker.connect("mem://device").expect("connect");
    let publisher = broker.connect("mem://device").expect("connect");

    let (tx, mut rx) = mpsc::unbounded_channel();
    subscriber
        .subscribe("iot/sensor/soil_moisture", move |message| {
            let _ = tx.send(message.payload.to_string());
        })
        .expect("subscribe");

    publisher.publish("iot/sensor/soil_moisture", "87").expect("publish");

    let payload = timeout(DELIVERY_TIMEOUT, rx.recv())
        .await
        .expect("delivery timed out")
        .expect("channel closed");
    assert_eq!(payload, "87");
}

#[tokio::test]
async fn test_per_topic_order_is_preserved() {
    let broker = Broker::new("mem://device");
    let subscriber = broker.connect("mem://device").expect("connect");
    let publisher = broker.connect("mem://device").expect("connect");

    let (tx, mut rx) = mpsc::unbounded_channel();
    subscriber
        .subscribe("iot/sensor/soil_moisture", move |message| {
            let _ = tx.send(message.payload.to_string());
        })
        .expect("subscribe");

    for i in 0..100 {
        publisher
            .publish("iot/sensor/soil_moisture", &i.to_string())
            .expect("publish");
    }

    for expected in 0..100 {
        let payload = timeout(DELIVERY_TIMEOUT, rx.recv())
            .await
            .expect("delivery timed out")
            .expect("channel closed");
        assert_eq!(payload, expected.to_string());
    }
}

#[tokio::test]
async fn test_publish_without_subscribers_is_not_an_error() {
    let broker = Broker::new("mem://device");
    let publisher = broker.connect("mem://device").expect("connect");

    assert!(publisher.publish("iot/status/pump_state", "ON").is_ok());
}

#[tokio::test]
async fn test_publish_fails_after_disconnect() {
    let broker = Broker::new("mem://device");
    let client = broker.connect("mem://device").expect("connect");

    client.disconnect().await;

    assert!(matches!(
        client.publish("iot/sensor/soil_moisture", "50"),
        Err(BusError::Publish(_))
    ));
    assert!(client.subscribe("iot/mode/set_mode", |_| {}).is_err());
}

#[tokio::test]
async fn test_queued_messages_drain_before_disconnect() {
    let broker = Broker::new("mem://device");
    let subscriber = broker.connect("mem://device").expect("connect");
    let publisher = broker.connect("mem://device").expect("connect");

    let (tx, mut rx) = mpsc::unbounded_channel();
    subscriber
        .subscribe("iot/actuator/pump_command", move |message| {
            let _ = tx.send(message.payload.to_string());
        })
        .expect("subscribe");

    publisher.publish("iot/actuator/pump_command", "ON").expect("publish");
    subscriber.disconnect().await;

    // The message was accepted before the disconnect; the delivery task
    // drains it on the way out.
    let payload = timeout(DELIVERY_TIMEOUT, rx.recv())
        .await
        .expect("delivery timed out")
        .expect("channel closed");
    assert_eq!(payload, "ON");
}

#[tokio::test]
async fn test_resubscribing_replaces_handler_without_duplicates() {
    let broker = Broker::new("mem://device");
    let subscriber = broker.connect("mem://device").expect("connect");
    let publisher = broker.connect("mem://device").expect("connect");

    let (old_tx, mut old_rx) = mpsc::unbounded_channel::<String>();
    subscriber
        .subscribe("iot/mode/set_mode", move |message| {
            let _ = old_tx.send(message.payload.to_string());
        })
        .expect("subscribe");

    let (tx, mut rx) = mpsc::unbounded_channel();
    subscriber
        .subscribe("iot/mode/set_mode", move |message| {
            let _ = tx.send(message.payload.to_string());
        })
        .expect("resubscribe");

    publisher.publish("iot/mode/set_mode", "Manual").expect("publish");

    let payload = timeout(DELIVERY_TIMEOUT, rx.recv())
        .await
        .expect("delivery timed out")
        .expect("channel closed");
    assert_eq!(payload, "Manual");

    // The replaced handler never fires, and there is exactly one delivery.
    assert!(old_rx.try_recv().is_err());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_cross_client_fanout() {
    let broker = Broker::new("mem://device");
    let publisher = broker.connect("mem://device").expect("connect");

    let mut receivers = Vec::new();
    let mut clients = Vec::new();
    for _ in 0..3 {
        let client = broker.connect("mem://device").expect("connect");
        let (tx, rx) = mpsc::unbounded_channel();
        client
            .subscribe("iot/status/pump_state", move |message| {
                let _ = tx.send(message.payload.to_string());
            })
            .expect("subscribe");
        receivers.push(rx);
        clients.push(client);
    }

    publisher.publish("iot/status/pump_state", "OFF").expect("publish");

    for rx in &mut receivers {
        let payload = timeout(DELIVERY_TIMEOUT, rx.recv())
            .await
            .expect("delivery timed out")
            .expect("channel closed");
        assert_eq!(payload, "OFF");
    }
}
