use crate::grid_library;
use arcdream::compress::{compress, CompressionConfig};
use arcdream::dsl::grid;
use arcdream::library::{LibrarySnapshot, ProgramRecord};
use arcdream::semantics::evaluate;

#[test]
fn test_learned_library_survives_save_and_restore() {
    let lib = grid_library();
    let programs = [
        "cat_h(fill(2, 3, 1), fill(4, 3, 1))",
        "flip_h(cat_h(fill(2, 3, 1), fill(4, 3, 1)))",
        "cat_v(fill(1, 2, 2), fill(1, 2, 2))",
        "rep_t(fill(1, 2, 2), 3)",
    ]
    .iter()
    .map(|t| lib.parse(t).unwrap())
    .collect();
    let result = compress(&lib, programs, &CompressionConfig::default()).unwrap();
    assert!(result.library.discovered().count() >= 2);

    let dir = tempfile::tempdir().unwrap();
    let library_path = dir.path().join("library.json");
    LibrarySnapshot::capture(&result.library)
        .save(&library_path)
        .unwrap();

    let records: Vec<_> = result
        .programs
        .iter()
        .map(|p| ProgramRecord::of_program(&result.library, p))
        .collect();
    let programs_path = dir.path().join("programs.json");
    std::fs::write(&programs_path, serde_json::to_string(&records).unwrap()).unwrap();

    let restored = LibrarySnapshot::load(&library_path)
        .unwrap()
        .restore(grid::grid_primitives())
        .unwrap();
    assert_eq!(restored.len(), result.library.len());
    for (a, b) in restored.discovered().zip(result.library.discovered()) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.args, b.args);
        assert_eq!(
            restored.display(a.body().unwrap()).to_string(),
            result.library.display(b.body().unwrap()).to_string()
        );
    }

    let loaded: Vec<ProgramRecord> =
        serde_json::from_str(&std::fs::read_to_string(&programs_path).unwrap()).unwrap();
    for (record, original) in loaded.iter().zip(&result.programs) {
        let program = record.to_program(&restored).unwrap();
        assert_eq!(
            evaluate(&restored, &program).unwrap(),
            evaluate(&result.library, original).unwrap()
        );
    }
}
