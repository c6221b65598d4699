use crate::grid_library;
use arcdream::compress::{compress, description_length, CompressionConfig};
use arcdream::ir::{Head, Program, Type};
use arcdream::library::{Library, Prior};
use arcdream::sample::Sampler;
use arcdream::semantics::evaluate;

fn corpus(lib: &Library) -> Vec<Program> {
    let prior = Prior::uniform(lib);
    let mut programs: Vec<Program> = Sampler::new(lib, &prior, 5)
        .with_max_depth(3)
        .dream(&Type::MAT, 16)
        .into_iter()
        .map(|d| d.program)
        .collect();
    for text in [
        "cat_h(fill(2, 3, 1), fill(4, 3, 1))",
        "flip_h(cat_h(fill(2, 3, 1), fill(4, 3, 1)))",
        "rep_t(cat_h(fill(2, 3, 1), fill(1, 3, 1)), 2)",
        "recolor(fill(2, 3, 1), 2, 5)",
    ] {
        programs.push(lib.parse(text).unwrap());
    }
    programs
}

#[test]
fn test_compression_preserves_every_value() {
    let lib = grid_library();
    let programs = corpus(&lib);
    let before: Vec<_> = programs
        .iter()
        .map(|p| evaluate(&lib, p).unwrap())
        .collect();

    let result = compress(&lib, programs, &CompressionConfig::default()).unwrap();
    assert!(!result.adopted.is_empty());
    for (program, value) in result.programs.iter().zip(&before) {
        assert_eq!(&evaluate(&result.library, program).unwrap(), value);
    }
}

#[test]
fn test_each_adoption_shrinks_the_corpus() {
    let mut lib = grid_library();
    let mut programs = corpus(&lib);
    let step = CompressionConfig::default().with_max_iterations(1);

    let mut rounds = 0;
    loop {
        let trees: usize = programs.iter().map(Program::size).sum();
        let dl = description_length(&lib, &programs);
        let result = compress(&lib, programs, &step).unwrap();
        let Some(adoption) = result.adopted.first() else {
            break;
        };
        assert!(adoption.score > 0);
        let next_trees: usize = result.programs.iter().map(Program::size).sum();
        assert!(next_trees < trees);
        assert_eq!(dl as i64 - result.description_length() as i64, adoption.score);

        rounds += 1;
        lib = result.library;
        programs = result.programs;
    }
    assert!(rounds >= 1);
    assert_eq!(lib.discovered().count(), rounds);
}

#[test]
fn test_discovered_bodies_never_reach_into_frozen_calls() {
    let lib = grid_library();
    let result = compress(&lib, corpus(&lib), &CompressionConfig::default()).unwrap();

    for def in result.library.discovered() {
        let body = def.body().unwrap();
        let forest = body.forest();
        for id in forest.preorder(body.root()) {
            let node = forest.get(id);
            assert!(!node.frozen, "{} contains a frozen node", def.name);
            if let Head::Call(prim) = node.head {
                let callee = result.library.get(prim).unwrap();
                assert!(!callee.is_discovered(), "{} calls {}", def.name, callee.name);
            }
        }
    }
}

#[test]
fn test_compression_is_deterministic() {
    let lib = grid_library();
    let a = compress(&lib, corpus(&lib), &CompressionConfig::default()).unwrap();
    let b = compress(&lib, corpus(&lib), &CompressionConfig::default()).unwrap();

    let show = |r: &arcdream::compress::CompressionResult| {
        r.library
            .discovered()
            .map(|def| r.library.display(def.body().unwrap()).to_string())
            .collect::<Vec<_>>()
    };
    assert_eq!(show(&a), show(&b));
    assert_eq!(a.programs, b.programs);
}
