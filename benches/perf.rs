use bal::config::BalConfig;
use bal::dispatch::{ActionRegistry, Dispatcher, encode_binary_action, encode_text_args};
use bal::error::BalError;
use bal::keys::composite2;
use bal::name::Name;
use bal::storage::{FlatMemoryEngine, NativeScopeEngine, ScopeEmulation, Store};
use bal::table::{Row, SecondaryIndexDescriptor, Table};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde::{Deserialize, Serialize};

const SEEDED_ROWS: u64 = 10_000;
const SCOPE: u64 = 7;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Account {
    id: u64,
    owner: Name,
    balance: u64,
}

impl Row for Account {
    const TABLE_NAME: Name = Name::new("accounts");
    type PrimaryKey = u64;

    fn primary_key(&self) -> u64 {
        self.id
    }

    fn secondary_indexes() -> Vec<SecondaryIndexDescriptor<Self>> {
        vec![SecondaryIndexDescriptor::try_new(
            Name::new("byowner"),
            |a: &Account| composite2(a.owner, a.balance),
        )]
    }
}

fn seeded(store: Store) -> Table<Account> {
    let table = Table::<Account>::open(&store, SCOPE).expect("open");
    for id in 0..SEEDED_ROWS {
        table
            .create(|a| {
                a.id = id;
                a.owner = Name::from_raw(id % 64);
                a.balance = id * 3;
            })
            .expect("seed");
    }
    table
}

fn bench_tables(c: &mut Criterion) {
    let native = seeded(Store::new(NativeScopeEngine::new()));
    let emulated = seeded(Store::new(ScopeEmulation::new(FlatMemoryEngine::new())));

    for (label, table) in [("native", &native), ("emulated", &emulated)] {
        c.bench_function(&format!("{label}_find_by_primary"), |b| {
            let mut id = 0u64;
            b.iter(|| {
                id = (id + 7919) % SEEDED_ROWS;
                black_box(table.find_id(black_box(id)).expect("find"));
            })
        });

        c.bench_function(&format!("{label}_secondary_range_100"), |b| {
            let index = table.secondary_index(Name::new("byowner")).expect("index");
            b.iter(|| {
                let rows = index
                    .iter()
                    .take(100)
                    .collect::<Result<Vec<_>, BalError>>()
                    .expect("range");
                black_box(rows);
            })
        });

        c.bench_function(&format!("{label}_modify_secondary_key"), |b| {
            let mut id = 0u64;
            b.iter(|| {
                id = (id + 31) % SEEDED_ROWS;
                let cursor = table.find(id).expect("find");
                table
                    .modify(&cursor, |a| a.balance = a.balance.wrapping_add(1))
                    .expect("modify");
            })
        });
    }
}

#[derive(Default)]
struct Sink {
    total: u64,
}

impl Sink {
    fn add(&mut self, amount: u64, memo: String) -> Result<(), BalError> {
        self.total = self.total.wrapping_add(amount + memo.len() as u64);
        Ok(())
    }
}

fn bench_dispatch(c: &mut Criterion) {
    let mut registry = ActionRegistry::new();
    registry
        .action(Name::new("add"), Sink::add)
        .expect("register");
    let dispatcher = Dispatcher::new(&BalConfig::new("sink"), registry).expect("dispatcher");
    let binary = encode_binary_action("sink", 0, &(42u64, "memo".to_string()));
    let text = encode_text_args("sink", Name::new("add"), &(42u64, "memo".to_string()))
        .expect("encode");
    let mut sink = Sink::default();

    c.bench_function("dispatch_binary", |b| {
        b.iter(|| {
            let (_, action) = dispatcher.parse(black_box(&binary));
            if let Some(action) = action {
                dispatcher.dispatch(&mut sink, action).expect("dispatch");
            }
        })
    });

    c.bench_function("dispatch_text", |b| {
        b.iter(|| {
            let (_, action) = dispatcher.parse(black_box(&text));
            if let Some(action) = action {
                dispatcher.dispatch(&mut sink, action).expect("dispatch");
            }
        })
    });
    black_box(sink.total);
}

criterion_group!(benches, bench_tables, bench_dispatch);
criterion_main!(benches);
