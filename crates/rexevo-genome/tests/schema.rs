use rand::SeedableRng;
use rand_pcg::Pcg64;
use rexevo_genome::{Genome, RecordError, ShapeError, load_records, to_json};

#[test]
fn test_saved_genomes_predict_identically() {
    let mut rng = Pcg64::seed_from_u64(42);
    let mut genomes: Vec<_> = (0..3).map(|_| Genome::controller(&mut rng)).collect();
    genomes[1].set_fitness(Some(7.0));

    let json = to_json(&genomes).unwrap();
    let loaded = load_records(&json).unwrap();
    assert!(loaded.errors.is_empty());
    assert_eq!(loaded.genomes.len(), 3);

    let input = [0.25, 0.4, -0.1, 1.2];
    for (saved, restored) in genomes.iter().zip(&loaded.genomes) {
        assert_eq!(saved.predict(&input).unwrap(), restored.predict(&input).unwrap());
        assert_eq!(saved.topology(), restored.topology());
    }
    assert_eq!(loaded.genomes[1].fitness(), Some(7.0));
    assert_eq!(loaded.genomes[0].fitness(), None);
}

#[test]
fn test_malformed_records_are_skipped() {
    let mut rng = Pcg64::seed_from_u64(7);
    let good = Genome::controller(&mut rng);
    let good_record = serde_json::to_value(good.to_record()).unwrap();

    let mut short_kernel = good_record.clone();
    short_kernel["weights"][0]["values"] = serde_json::json!([0.0, 1.0]);

    let mut bad_activation = good_record.clone();
    bad_activation["layers"][1]["activation"] = serde_json::json!("tanh");

    let mut huge_kernel = good_record.clone();
    huge_kernel["weights"][0]["shape"] = serde_json::json!([1_u64 << 63, 2]);
    huge_kernel["weights"][0]["values"] = serde_json::json!([]);

    let set = serde_json::json!([
        short_kernel,
        good_record,
        "not a record",
        bad_activation,
        huge_kernel
    ]);
    let loaded = load_records(&set.to_string()).unwrap();

    assert_eq!(loaded.genomes.len(), 1);
    assert_eq!(loaded.genomes[0], good);

    let indices: Vec<_> = loaded.errors.iter().map(|(i, _)| *i).collect();
    assert_eq!(indices, [0, 2, 3, 4]);
    assert!(matches!(loaded.errors[0].1, RecordError::Tensor(_)));
    assert!(matches!(loaded.errors[1].1, RecordError::Parse(_)));
    assert!(matches!(loaded.errors[2].1, RecordError::Parse(_)));
    assert!(matches!(
        loaded.errors[3].1,
        RecordError::Tensor(ShapeError::Overflow { .. })
    ));
}
