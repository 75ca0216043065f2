//! Role driver tests.
//!
//! Test categories:
//! 1. Replay service: single serve step, configuration, spawn and shutdown
//! 2. Producer loop: initial pull, pushes, parameter refresh at episode ends
//! 3. Consumer loop: parameter publication, early stop, cancellation
//! 4. Full cluster: producers → replay → consumer on separate threads

use std::ops::ControlFlow;
use std::thread;
use std::time::Duration;

use super::*;
use crate::channel::{ChannelRegistry, WaitStrategy};
use crate::core::{CancelToken, FieldSpec, Record, Schema, Tensor};
use crate::payload::{ParameterSet, PayloadError};
use crate::relay::{RelayConfig, RelayError, RelayModule};
use crate::topology::StaticTopology;

// ============================================================================
// Helpers
// ============================================================================

fn fast_wait() -> WaitStrategy {
    WaitStrategy::notify(Duration::from_millis(2))
}

fn transition_schema() -> Schema {
    Schema::new(vec![FieldSpec::f32("obs", [2]), FieldSpec::f32("reward", [])]).unwrap()
}

fn transition(value: f32) -> Record {
    Record::new()
        .with("obs", Tensor::from_f32([2], vec![value, value]).unwrap())
        .with("reward", Tensor::scalar_f32(value))
}

fn weights(value: f32) -> Record {
    Record::new().with("w", Tensor::from_f32([2], vec![value, value]).unwrap())
}

fn weight_of(params: &ParameterSet) -> f32 {
    params.get("w").unwrap().as_f32().unwrap()[0]
}

fn cluster(workers: usize) -> StaticTopology {
    StaticTopology::default()
        .with_local_role("worker", workers)
        .unwrap()
        .with_local_role("replay_buffer", 1)
        .unwrap()
        .with_local_role("learner", 1)
        .unwrap()
}

fn replay_config(batch_size: usize) -> ReplayServiceConfig {
    ReplayServiceConfig::new(transition_schema(), 8, batch_size)
        .with_seed(11)
        .with_wait(fast_wait())
}

/// learner → worker parameter edge.
fn parameter_config(role: &str, index: usize) -> RelayConfig {
    RelayConfig::new(role, index)
        .with_source("learner")
        .with_sink("worker")
        .with_push_to_all(true)
        .with_outbound_depth(0)
        .with_wait(fast_wait())
}

fn relay(
    holder: ParameterSet,
    topology: &StaticTopology,
    registry: &ChannelRegistry,
    config: RelayConfig,
) -> RelayModule<ParameterSet> {
    RelayModule::new(holder, topology, registry, config).unwrap()
}

// ============================================================================
// Replay service
// ============================================================================

#[test]
fn test_serve_one_turns_a_row_into_a_batch() {
    let topology = cluster(1);
    let registry = ChannelRegistry::new();
    let config = replay_config(3);

    let mut worker = relay(
        ParameterSet::zeros(&transition_schema()),
        &topology,
        &registry,
        config.endpoint("worker", 0),
    );
    let mut learner = relay(
        ParameterSet::zeros(&transition_schema()),
        &topology,
        &registry,
        config.endpoint("learner", 0),
    );
    let mut service = ReplayService::new(&config, 0, &topology, &registry).unwrap();

    worker.push(Some(transition(4.0)), None).unwrap();
    service.serve_one().unwrap();
    assert_eq!(service.store().len(), 1);

    let batch = learner.pull_data().unwrap();
    assert_eq!(batch.get("obs").unwrap().shape(), &[3, 2]);
    assert_eq!(batch.get("reward").unwrap().as_f32().unwrap(), &[4.0, 4.0, 4.0]);
    assert_eq!(
        service.stats(),
        ReplayStats {
            rows_received: 1,
            batches_served: 1
        }
    );
}

#[test]
fn test_zero_batch_size_rejected() {
    let topology = cluster(1);
    let registry = ChannelRegistry::new();
    let result = ReplayService::new(&replay_config(0), 0, &topology, &registry);
    match result {
        Err(err @ RelayError::Payload(PayloadError::ZeroBatchSize)) => {
            assert_eq!(err.to_string(), "batch size must be at least 1");
        }
        other => panic!("expected zero batch size, got {:?}", other.err()),
    }
    assert!(registry.is_empty());
}

#[test]
fn test_zero_store_capacity_rejected() {
    let topology = cluster(1);
    let registry = ChannelRegistry::new();
    let config = ReplayServiceConfig::new(transition_schema(), 0, 4);
    let result = ReplayService::new(&config, 0, &topology, &registry);
    assert!(matches!(
        result,
        Err(RelayError::Payload(PayloadError::ZeroCapacity))
    ));
}

#[test]
fn test_endpoint_configs_agree() {
    let config = replay_config(4);
    let worker = config.endpoint("worker", 1);
    let learner = config.endpoint("learner", 0);
    assert_eq!(worker.roles, learner.roles);
    assert_eq!(worker.schema, Some(transition_schema()));
    assert_eq!(learner.outbound_batch, Some(4));
    assert_eq!(worker.index, 1);
}

#[test]
fn test_replay_config_from_json() {
    let config: ReplayServiceConfig = serde_json::from_str(
        r#"{
            "store": {"capacity": 16, "fields": [{"name": "x", "dtype": "f32", "shape": [3]}]},
            "batch_size": 4
        }"#,
    )
    .unwrap();
    assert_eq!(config.store.capacity, 16);
    assert_eq!(config.batch_size, 4);
    assert_eq!(config.replay_role, "replay_buffer");
}

#[test]
fn test_spawned_service_stops_while_idle() {
    let topology = cluster(1);
    let registry = ChannelRegistry::new();
    let service = ReplayService::new(&replay_config(2), 0, &topology, &registry).unwrap();

    let handle = service.spawn().unwrap();
    thread::sleep(Duration::from_millis(20));
    assert!(!handle.is_finished());

    let stats = handle.shutdown().unwrap().unwrap();
    assert_eq!(stats, ReplayStats::default());
}

// ============================================================================
// Producer loop
// ============================================================================

#[test]
fn test_producer_refreshes_parameters_at_episode_end() {
    let topology = cluster(1);
    let registry = ChannelRegistry::new();
    let config = replay_config(2);

    let mut learner = relay(
        ParameterSet::new(weights(0.0)),
        &topology,
        &registry,
        parameter_config("learner", 0),
    );
    let mut parameters = relay(
        ParameterSet::new(weights(0.0)),
        &topology,
        &registry,
        parameter_config("worker", 0),
    );
    let mut experience = relay(
        ParameterSet::zeros(&transition_schema()),
        &topology,
        &registry,
        config.endpoint("worker", 0),
    );

    learner.push(Some(weights(1.0)), None).unwrap();
    learner.push(Some(weights(2.0)), None).unwrap();

    let mut seen = Vec::new();
    let mut step = 0;
    let stats = run_producer(&mut parameters, &mut experience, &CancelToken::new(), |params| {
        step += 1;
        seen.push(weight_of(params));
        match step {
            3 => Produced::EpisodeEnd(transition(step as f32)),
            s if s > 6 => Produced::Finished,
            s => Produced::Transition(transition(s as f32)),
        }
    })
    .unwrap();

    assert_eq!(seen, vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0]);
    assert_eq!(stats.iterations, 6);
    assert_eq!(stats.records_pushed, 6);
    assert_eq!(stats.parameter_updates, 2);

    let inbound = registry.get("replay_bufferInboundFromworker(0,0)").unwrap();
    assert_eq!(inbound.len(), 6);
}

#[test]
fn test_producer_cancelled_before_parameters_arrive() {
    let topology = cluster(1);
    let registry = ChannelRegistry::new();
    let stop = CancelToken::new();
    let mut parameters = relay(
        ParameterSet::new(weights(0.0)),
        &topology,
        &registry,
        parameter_config("worker", 0),
    )
    .with_cancel_token(stop.clone());
    let mut experience = relay(
        ParameterSet::zeros(&transition_schema()),
        &topology,
        &registry,
        replay_config(2).endpoint("worker", 0),
    );

    let handle = spawn_service("producer-0", stop, move |cancel| {
        run_producer(&mut parameters, &mut experience, &cancel, |_| {
            Produced::Finished
        })
    })
    .unwrap();
    thread::sleep(Duration::from_millis(20));

    let stats = handle.shutdown().unwrap().unwrap();
    assert_eq!(stats, DriverStats::default());
}

// ============================================================================
// Consumer loop
// ============================================================================

#[test]
fn test_consumer_publishes_before_and_after_training() {
    let topology = cluster(1);
    let registry = ChannelRegistry::new();
    let config = replay_config(2);

    let mut parameters = relay(
        ParameterSet::new(weights(0.0)),
        &topology,
        &registry,
        parameter_config("learner", 0),
    );
    let mut batches = relay(
        ParameterSet::zeros(&transition_schema()),
        &topology,
        &registry,
        config.endpoint("learner", 0),
    );
    let mut worker = relay(
        ParameterSet::new(weights(0.0)),
        &topology,
        &registry,
        parameter_config("worker", 0),
    );
    let mut service = ReplayService::new(&config, 0, &topology, &registry).unwrap();
    let mut producer = relay(
        ParameterSet::zeros(&transition_schema()),
        &topology,
        &registry,
        config.endpoint("worker", 0),
    );

    for i in 0..2 {
        producer.push(Some(transition(i as f32)), None).unwrap();
    }
    // Outbound depth is 1: serve the second batch once the first is taken.
    service.serve_one().unwrap();
    let server = thread::spawn(move || {
        service.serve_one().unwrap();
        service
    });

    let mut trained = 0;
    let stats = run_consumer(&mut parameters, &mut batches, &CancelToken::new(), |params, batch| {
        assert_eq!(batch.get("obs").unwrap().shape(), &[2, 2]);
        trained += 1;
        params.set("w", Tensor::from_f32([2], vec![trained as f32; 2]).unwrap()).unwrap();
        if trained == 2 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })
    .unwrap();
    server.join().unwrap();

    assert_eq!(stats.iterations, 2);
    assert_eq!(stats.parameter_updates, 3);

    let mut versions = Vec::new();
    while worker.maybe_pull().unwrap() {
        versions.push(weight_of(worker.holder()));
    }
    assert_eq!(versions, vec![0.0, 1.0, 2.0]);
}

#[test]
fn test_consumer_stops_when_cancelled_while_waiting() {
    let topology = cluster(1);
    let registry = ChannelRegistry::new();
    let stop = CancelToken::new();

    let mut parameters = relay(
        ParameterSet::new(weights(0.0)),
        &topology,
        &registry,
        parameter_config("learner", 0),
    );
    let mut batches = relay(
        ParameterSet::zeros(&transition_schema()),
        &topology,
        &registry,
        replay_config(2).endpoint("learner", 0),
    )
    .with_cancel_token(stop.clone());

    let handle = spawn_service("consumer-0", stop, move |cancel| {
        run_consumer(&mut parameters, &mut batches, &cancel, |_, _| ControlFlow::Continue(()))
    })
    .unwrap();
    thread::sleep(Duration::from_millis(20));

    let stats = handle.shutdown().unwrap().unwrap();
    assert_eq!(stats.iterations, 0);
    assert_eq!(stats.parameter_updates, 1);
}

// ============================================================================
// Full cluster
// ============================================================================

#[test]
fn test_cluster_of_threads() {
    const WORKERS: usize = 2;
    let topology = cluster(WORKERS);
    let registry = ChannelRegistry::new();
    let config = replay_config(4);
    let stop = CancelToken::new();

    let replay = ReplayService::new(&config, 0, &topology, &registry)
        .unwrap()
        .with_cancel_token(stop.clone())
        .spawn()
        .unwrap();

    let workers: Vec<_> = (0..WORKERS)
        .map(|i| {
            let mut parameters = relay(
                ParameterSet::new(weights(0.0)),
                &topology,
                &registry,
                parameter_config("worker", i),
            )
            .with_cancel_token(stop.clone());
            let mut experience = relay(
                ParameterSet::zeros(&transition_schema()),
                &topology,
                &registry,
                config.endpoint("worker", i),
            )
            .with_cancel_token(stop.clone());
            spawn_service(format!("worker-{}", i), stop.clone(), move |cancel| {
                let mut step = 0u32;
                run_producer(&mut parameters, &mut experience, &cancel, |params| {
                    thread::sleep(Duration::from_millis(1));
                    step += 1;
                    let record = transition(weight_of(params) + i as f32);
                    if step % 5 == 0 {
                        Produced::EpisodeEnd(record)
                    } else {
                        Produced::Transition(record)
                    }
                })
            })
            .unwrap()
        })
        .collect();

    let mut parameters = relay(
        ParameterSet::new(weights(0.0)),
        &topology,
        &registry,
        parameter_config("learner", 0),
    );
    let mut batches = relay(
        ParameterSet::zeros(&transition_schema()),
        &topology,
        &registry,
        config.endpoint("learner", 0),
    );

    let mut rounds = 0;
    let stats = run_consumer(&mut parameters, &mut batches, &CancelToken::new(), |params, batch| {
        assert_eq!(batch.get("reward").unwrap().shape(), &[4]);
        rounds += 1;
        params.set("w", Tensor::from_f32([2], vec![rounds as f32; 2]).unwrap()).unwrap();
        if rounds == 5 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })
    .unwrap();
    assert_eq!(stats.iterations, 5);

    stop.cancel();
    let replay_stats = replay.join().unwrap().unwrap();
    assert!(replay_stats.batches_served >= 5);
    for handle in workers {
        let worker_stats = handle.join().unwrap().unwrap();
        assert!(worker_stats.parameter_updates >= 1);
        assert!(worker_stats.records_pushed >= 1);
    }
}
