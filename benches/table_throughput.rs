//! Add and point-get throughput of an indexed AutoKey table on each engine.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use isodb::prelude::*;
use tempfile::TempDir;

const ROWS: u32 = 5000;

#[derive(Debug, Clone, bincode::Encode, bincode::Decode)]
struct Article {
    title: String,
    body: String,
    views: u32,
}

type Row = Bincode<Article>;

fn schema() -> DbDef {
    DbDef::new().table(
        TableDef::<AutoKey, Row>::new("articles").with_index(IndexDef::new(
            "by_title",
            |_key, row: &Row| Some(StringKey::from(row.0.title.as_str())),
        )),
    )
}

fn article(i: u32) -> Row {
    Bincode(Article {
        title: format!("article-{i:05}"),
        body: "lorem ipsum ".repeat(8),
        views: i,
    })
}

fn fill<E: StorageEngine>(db: &Database<E>) {
    db.transact(|tx| {
        let articles = tx.table::<AutoKey, Row>("articles")?;
        for i in 0..ROWS {
            articles.add(&article(i))?;
        }
        Ok(())
    })
    .unwrap();
}

fn read_all<E: StorageEngine>(db: &Database<E>) -> u64 {
    db.transact_readonly(|tx| {
        let articles = tx.table::<AutoKey, Row>("articles")?;
        let mut views = 0u64;
        for key in 1..=ROWS {
            if let Some(row) = articles.get(AutoKey(key))? {
                views += u64::from(row.0.views);
            }
        }
        Ok(views)
    })
    .unwrap()
}

fn memory() -> Database<MemoryStore> {
    open_db(MemoryStore::new(), schema()).unwrap()
}

fn sled(dir: &TempDir) -> Database<SledStore> {
    let config = FileConfig::builder()
        .path(dir.path().join("sled"))
        .truncate(true)
        .use_fsync(false)
        .build();
    open_db(SledStore::new(config).unwrap(), schema()).unwrap()
}

fn redb(dir: &TempDir) -> Database<RedbStore> {
    let config = FileConfig::builder()
        .path(dir.path().join("store.redb"))
        .truncate(true)
        .build();
    open_db(RedbStore::new(config).unwrap(), schema()).unwrap()
}

fn bench_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_add");
    group.sample_size(10);
    let dir = TempDir::new().unwrap();

    group.bench_function(BenchmarkId::new("memory", ROWS), |b| {
        b.iter(|| {
            let db = memory();
            fill(&db);
            black_box(db);
        });
    });
    group.bench_function(BenchmarkId::new("sled", ROWS), |b| {
        b.iter(|| {
            let db = sled(&dir);
            fill(&db);
            db.close().unwrap();
        });
    });
    group.bench_function(BenchmarkId::new("redb", ROWS), |b| {
        b.iter(|| {
            let db = redb(&dir);
            fill(&db);
            db.close().unwrap();
        });
    });

    group.finish();
}

fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_get");
    let dir = TempDir::new().unwrap();

    let db = memory();
    fill(&db);
    group.bench_function(BenchmarkId::new("memory", ROWS), |b| {
        b.iter(|| black_box(read_all(&db)));
    });

    let db = sled(&dir);
    fill(&db);
    group.bench_function(BenchmarkId::new("sled", ROWS), |b| {
        b.iter(|| black_box(read_all(&db)));
    });

    let db = redb(&dir);
    fill(&db);
    group.bench_function(BenchmarkId::new("redb", ROWS), |b| {
        b.iter(|| black_box(read_all(&db)));
    });

    group.finish();
}

criterion_group!(benches, bench_add, bench_get);
criterion_main!(benches);
