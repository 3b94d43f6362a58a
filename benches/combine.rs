use criterion::{criterion_group, criterion_main, Criterion};
use pangraph_block::{combine, Alignment, Orientation};
use pangraph_block::block::{Block, DelMap, InsMap, SnpMap};
use pangraph_block::cigar::parse_cigar_string;
use pangraph_block::interval::Interval;
use pangraph_block::NodeId;

fn build_block(consensus: &[u8], members: usize) -> Block {
    let mut b = Block::new(consensus.to_vec());
    for i in 0..members {
        let snp = if i % 7 == 0 {
            SnpMap::from([(1, b'N')])
        } else {
            SnpMap::new()
        };
        b.append(NodeId::new(i as u64), snp, InsMap::new(), DelMap::new())
            .unwrap();
    }
    b
}

fn criterion_benchmark(c: &mut Criterion) {
    let len = 2000;
    let q = build_block(&vec![b'A'; len], 64);
    let r = build_block(&vec![b'A'; len], 64);
    let alignment = Alignment {
        cigar: parse_cigar_string(&format!("{len}M")).unwrap(),
        orientation: Orientation::Forward,
        qry_interval: Interval::new(1, len + 1),
        ref_interval: Interval::new(1, len + 1),
    };

    c.bench_function("combine 2000bp x 128 members", |b| {
        b.iter(|| combine(&q, &r, &alignment, 50).unwrap())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
