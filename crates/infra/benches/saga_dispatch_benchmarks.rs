use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use sagabus_core::CorrelationId;
use sagabus_events::{
    BusRef, CorrelatedBy, DataEvent, InMemoryServiceBus, Message, RaiseEvent, SagaStateMachine,
    TransitionError,
};
use sagabus_infra::{
    deliver, ExistingSagaPolicy, InMemorySagaRepository, InitiateSagaSink, OrchestrateSagaSink,
    RepositoryConfig,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Ping {
    correlation_id: CorrelationId,
}

impl Message for Ping {
    fn message_type() -> &'static str {
        "bench.ping"
    }
}

impl CorrelatedBy for Ping {
    fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }
}

const PING: DataEvent<Ping> = DataEvent::new("ping");

/// Counts pings; never publishes, so the bus is not part of the measurement.
struct CounterSaga {
    correlation_id: CorrelationId,
    pings: u64,
    bus: Option<BusRef>,
}

impl SagaStateMachine for CounterSaga {
    type State = u64;

    fn saga_type() -> &'static str {
        "saga.bench_counter"
    }

    fn initiate(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            pings: 0,
            bus: None,
        }
    }

    fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    fn current_state(&self) -> &u64 {
        &self.pings
    }

    fn bus(&self) -> Option<&BusRef> {
        self.bus.as_ref()
    }

    fn bind_bus(&mut self, bus: BusRef) {
        self.bus = Some(bus);
    }
}

impl RaiseEvent<Ping> for CounterSaga {
    fn raise_event(&mut self, _event: &DataEvent<Ping>, _message: &Ping) -> Result<(), TransitionError> {
        self.pings += 1;
        Ok(())
    }
}

fn bus() -> BusRef {
    Arc::new(InMemoryServiceBus::new("mem://bench"))
}

fn bench_initiation_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("initiation_latency");
    group.sample_size(1000);

    // Benchmark: fresh saga per message
    group.bench_function("initiate_fresh", |b| {
        let sink = InitiateSagaSink::new(bus(), InMemorySagaRepository::<CounterSaga>::new(), PING);
        b.iter(|| {
            let message = Ping {
                correlation_id: CorrelationId::nil(),
            };
            black_box(deliver(&sink, &message).unwrap());
        });
    });

    // Benchmark: redelivery of a start message to a loaded saga
    group.bench_function("initiate_existing_loaded", |b| {
        let repo = InMemorySagaRepository::<CounterSaga>::new()
            .with_config(RepositoryConfig::default().with_existing_saga(ExistingSagaPolicy::Load));
        let sink = InitiateSagaSink::new(bus(), repo, PING);
        let message = Ping {
            correlation_id: CorrelationId::new(),
        };
        b.iter(|| black_box(deliver(&sink, &message).unwrap()));
    });

    group.finish();
}

fn bench_orchestration_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("orchestration_throughput");

    for saga_count in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*saga_count as u64));
        group.bench_with_input(
            BenchmarkId::new("route_to_existing", saga_count),
            saga_count,
            |b, &count| {
                let repo = InMemorySagaRepository::<CounterSaga>::new();
                let messages: Vec<_> = (0..count)
                    .map(|_| {
                        let correlation_id = CorrelationId::new();
                        repo.insert(CounterSaga::initiate(correlation_id)).unwrap();
                        Ping { correlation_id }
                    })
                    .collect();
                let sink = OrchestrateSagaSink::new(bus(), repo, PING);

                b.iter(|| {
                    for message in &messages {
                        black_box(deliver(&sink, message).unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_initiation_latency, bench_orchestration_throughput);
criterion_main!(benches);
