//! Matching throughput for a tenant-sized batch pass.
//!
//! Run with: `cargo bench -p fulfillment-sourcing`

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use fulfillment_core::{RecordId, TenantId};
use fulfillment_sourcing::{Order, SheetTag, ShipmentInfo, SourcingIndex, SourcingRow};

fn sheet(tenant_id: TenantId, rows: usize) -> Vec<SourcingRow> {
    (0..rows)
        .map(|i| SourcingRow {
            id: RecordId::new(i as i64),
            tenant_id,
            row_ref: format!("R{i}"),
            shipment_info: if i % 2 == 0 {
                ShipmentInfo::new(format!("P-ORD{i:06} Recipient {i}"))
            } else {
                ShipmentInfo::new(format!("P-Recipient {i}"))
            },
            quantity_ordered: 3,
            quantity_imported: (i % 4) as i64,
            quantity_shipped: (i % 3) as i64,
            composition_note: String::new(),
            sheet_tag: SheetTag::Paid,
        })
        .collect()
}

fn orders(tenant_id: TenantId, count: usize) -> Vec<Order> {
    (0..count)
        .map(|i| {
            Order::new(
                RecordId::new(i as i64),
                tenant_id,
                if i % 2 == 0 { format!("ORD{i:06}") } else { String::new() },
                format!("Recipient {i}"),
            )
        })
        .collect()
}

fn bench_evaluate(c: &mut Criterion) {
    let tenant_id = TenantId::new();
    let mut group = c.benchmark_group("sourcing_index_evaluate");

    for size in [100usize, 1_000, 5_000] {
        let index = SourcingIndex::new(sheet(tenant_id, size));
        let batch = orders(tenant_id, size);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                for order in &batch {
                    black_box(index.evaluate(black_box(order)));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
