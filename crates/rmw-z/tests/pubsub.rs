// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end publish/subscribe scenarios.

mod common;

use common::{assert_eventually, context, count_support, Count};
use rmw_z::events::EventKind;
use rmw_z::qos::QosProfile;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn two_publishers_one_subscriber_preserve_per_publisher_order() {
    let ctx = context(20);
    let node = ctx.create_node("/", "pubsub_order").expect("node");

    let subscription = node
        .create_subscription("/counts", count_support(), QosProfile::keep_last(10))
        .expect("subscription");
    let pub1 = node
        .create_publisher("/counts", count_support(), QosProfile::default())
        .expect("publisher one");
    let pub2 = node
        .create_publisher("/counts", count_support(), QosProfile::default())
        .expect("publisher two");

    for value in 1..=3 {
        pub1.publish(&Count { value }).expect("publish");
    }
    for value in 10..=11 {
        pub2.publish(&Count { value }).expect("publish");
    }

    assert_eventually(TIMEOUT, "five queued samples", || subscription.queued() == 5);

    let mut last_seq: HashMap<[u8; 16], i64> = HashMap::new();
    for _ in 0..5 {
        let (message, info) = subscription
            .take()
            .expect("take")
            .expect("message available");
        let message = message.downcast_ref::<Count>().expect("count").value;
        assert!(message >= 1);
        if let Some(previous) = last_seq.insert(info.publisher_gid, info.sequence_number) {
            assert!(
                info.sequence_number > previous,
                "per-publisher sequence must be monotone"
            );
        }
    }
    assert!(subscription.take().expect("take").is_none());

    assert_eq!(last_seq.len(), 2, "samples from both publishers");
    assert_eq!(last_seq[&pub1.gid()], 3);
    assert_eq!(last_seq[&pub2.gid()], 2);
    assert_eq!(
        subscription
            .events()
            .take_status(EventKind::MessageLost)
            .total_count,
        0
    );

    ctx.shutdown().expect("shutdown");
}

#[test]
fn overflow_drops_oldest_and_counts_losses() {
    let ctx = context(21);
    let node = ctx.create_node("/", "pubsub_overflow").expect("node");

    let subscription = node
        .create_subscription("/overflow", count_support(), QosProfile::keep_last(2))
        .expect("subscription");
    let publisher = node
        .create_publisher("/overflow", count_support(), QosProfile::default())
        .expect("publisher");

    for value in 1..=4 {
        publisher.publish(&Count { value }).expect("publish");
    }

    assert_eventually(TIMEOUT, "loss counter to reach two", || {
        subscription.events().status(EventKind::MessageLost).total_count == 2
    });

    let (first, info1) = subscription.take().expect("take").expect("first");
    let (second, info2) = subscription.take().expect("take").expect("second");
    assert_eq!(first.downcast_ref::<Count>().expect("count").value, 3);
    assert_eq!(second.downcast_ref::<Count>().expect("count").value, 4);
    assert_eq!(info1.sequence_number, 3);
    assert_eq!(info2.sequence_number, 4);
    assert!(subscription.take().expect("take").is_none());

    let status = subscription.events().take_status(EventKind::MessageLost);
    assert_eq!(status.total_count, 2);

    ctx.shutdown().expect("shutdown");
}

#[test]
fn late_data_callback_install_coalesces_prior_arrivals() {
    let ctx = context(22);
    let node = ctx.create_node("/", "pubsub_callback").expect("node");

    let subscription = node
        .create_subscription("/late", count_support(), QosProfile::keep_last(10))
        .expect("subscription");
    let publisher = node
        .create_publisher("/late", count_support(), QosProfile::default())
        .expect("publisher");

    publisher.publish(&Count { value: 1 }).expect("publish");
    publisher.publish(&Count { value: 2 }).expect("publish");
    assert_eventually(TIMEOUT, "two queued samples", || subscription.queued() == 2);
    // Let the second arrival's notification land before installing.
    std::thread::sleep(Duration::from_millis(50));

    let invocations = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&invocations);
    subscription.set_data_callback(Some(Box::new(move |count| {
        recorded.lock().expect("record lock").push(count);
    })));

    // Drained exactly once with the coalesced count.
    assert_eq!(invocations.lock().expect("lock").as_slice(), &[2]);

    publisher.publish(&Count { value: 3 }).expect("publish");
    assert_eventually(TIMEOUT, "post-install invocation", || {
        invocations.lock().expect("lock").len() == 2
    });
    assert_eq!(invocations.lock().expect("lock").as_slice(), &[2, 1]);

    ctx.shutdown().expect("shutdown");
}

#[test]
fn message_info_carries_timestamps_and_gid() {
    let ctx = context(23);
    let node = ctx.create_node("/", "pubsub_info").expect("node");

    let subscription = node
        .create_subscription("/stamped", count_support(), QosProfile::default())
        .expect("subscription");
    let publisher = node
        .create_publisher("/stamped", count_support(), QosProfile::default())
        .expect("publisher");

    let before = rmw_z::fabric::now_ns();
    publisher.publish(&Count { value: 9 }).expect("publish");
    assert_eventually(TIMEOUT, "queued sample", || subscription.queued() == 1);

    let (_, info) = subscription.take().expect("take").expect("message");
    assert_eq!(info.sequence_number, 1);
    assert_eq!(info.publisher_gid, publisher.gid());
    assert!(info.source_timestamp >= before);
    assert!(info.received_timestamp >= before);

    ctx.shutdown().expect("shutdown");
}

#[test]
fn take_serialized_returns_raw_bytes() {
    let ctx = context(24);
    let node = ctx.create_node("/", "pubsub_raw").expect("node");

    let subscription = node
        .create_subscription("/raw", count_support(), QosProfile::default())
        .expect("subscription");
    let publisher = node
        .create_publisher("/raw", count_support(), QosProfile::default())
        .expect("publisher");

    publisher
        .publish_serialized(&42i64.to_le_bytes())
        .expect("publish serialized");
    assert_eventually(TIMEOUT, "queued sample", || subscription.queued() == 1);

    let (bytes, info) = subscription.take_serialized().expect("bytes");
    assert_eq!(bytes, 42i64.to_le_bytes());
    assert_eq!(info.sequence_number, 1);

    ctx.shutdown().expect("shutdown");
}

#[test]
fn wait_set_wakes_on_sample_arrival() {
    let ctx = context(25);
    let node = ctx.create_node("/", "pubsub_wait").expect("node");

    let subscription = node
        .create_subscription("/waited", count_support(), QosProfile::default())
        .expect("subscription");
    let publisher = node
        .create_publisher("/waited", count_support(), QosProfile::default())
        .expect("publisher");

    let wakes = Arc::new(AtomicUsize::new(0));
    let wait_set = rmw_z::WaitSet::new();

    let publish_handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        publisher.publish(&Count { value: 5 }).expect("publish");
    });

    let ready = wait_set.wait(&[subscription.as_ref() as &dyn rmw_z::Waitable], Some(TIMEOUT));
    if ready[0] {
        wakes.fetch_add(1, Ordering::SeqCst);
    }
    publish_handle.join().expect("publisher thread");

    assert_eq!(wakes.load(Ordering::SeqCst), 1);
    assert!(subscription.take().expect("take").is_some());

    ctx.shutdown().expect("shutdown");
}
