//! Integration test: ingestion and harmonization across mission exports

use orbital_horizon::error::OrbitalError;
use orbital_horizon::ingest::{
    decode_lossy, search_header, ColumnProfile, ColumnResolver, HeaderLocator,
};
use orbital_horizon::preprocessing::{SchemaHarmonizer, TemperaturePreference};
use orbital_horizon::schema::Label;
use orbital_horizon::PipelineConfig;

fn targets() -> Vec<String> {
    PipelineConfig::default().target_columns
}

fn archive_preamble(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("# archive note {}\n", i))
        .collect()
}

fn tess_export(rows: usize) -> String {
    let dispositions = ["CP", "PC", "FP", "KP", "APC", "FA", "IS"];
    let mut text = archive_preamble(4);
    text.push_str("toi,tid,tfopwg_disp,pl_orbper,pl_rade,pl_radeerr1,st_teff\n");
    for i in 0..rows {
        text.push_str(&format!(
            "{}.01,{},{},{},{},0.1,{}\n",
            1000 + i,
            5000 + i,
            dispositions[i % dispositions.len()],
            1.0 + i as f64,
            0.5 + (i % 10) as f64,
            5000 + (i % 7) * 100
        ));
    }
    text
}

#[test]
fn test_header_after_preamble() {
    let mut text = archive_preamble(12);
    text.push_str("kepid,koi_disposition,koi_prad\n1,CONFIRMED,1.2\n2,FALSE POSITIVE,0.8\n");

    let locator = HeaderLocator::new(&targets(), 300, 5);
    let table = locator.locate(&text).unwrap();
    assert_eq!(table.header_offset, 12);
    assert_eq!(table.frame.height(), 2);
    assert_eq!(table.column_names(), vec!["kepid", "koi_disposition", "koi_prad"]);
}

#[test]
fn test_header_beyond_search_limit() {
    let mut text = archive_preamble(8);
    text.push_str("kepid,koi_disposition\n1,CONFIRMED\n");

    let locator = HeaderLocator::new(&targets(), 5, 5);
    assert!(matches!(
        locator.locate(&text),
        Err(OrbitalError::HeaderNotFound { searched: 5 })
    ));
}

#[test]
fn test_no_label_column_in_short_file() {
    let mut text = String::from("a,b,c\n");
    for i in 0..49 {
        text.push_str(&format!("{},{},{}\n", i, i * 2, i * 3));
    }
    let locator = HeaderLocator::from_config(&PipelineConfig::default());
    assert!(matches!(locator.locate(&text), Err(OrbitalError::HeaderNotFound { .. })));
}

#[test]
fn test_search_header_is_pure() {
    let candidates = vec!["disposition".to_string()];
    let probe = |offset: usize| match offset {
        0 => None,
        1 => Some(vec!["x".to_string()]),
        _ => Some(vec!["id".to_string(), " Disposition ".to_string()]),
    };
    assert_eq!(search_header(0..10, &candidates, probe), Some(2));
    assert_eq!(search_header(0..2, &candidates, probe), None);
}

#[test]
fn test_lossy_bytes_still_parse() {
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(b"kepid,koi_disposition\n1,CONF");
    bytes.push(0xFF);
    bytes.extend_from_slice(b"IRMED\n");

    let text = decode_lossy(&bytes);
    let table = HeaderLocator::new(&targets(), 300, 5).locate(&text).unwrap();
    assert_eq!(table.header_offset, 0);
    assert_eq!(table.column_names()[1], "koi_disposition");
}

#[test]
fn test_resolution_is_order_independent_and_idempotent() {
    let profiles = vec![
        ColumnProfile::new("tfopwg_disp", 500),
        ColumnProfile::new("pl_rade", 480),
        ColumnProfile::new("pl_radeerr1", 470),
        ColumnProfile::new("st_teff", 490),
        ColumnProfile::new("pl_eqt", 20),
    ];
    let resolver = ColumnResolver::new(&targets(), 300);

    let forward = resolver.resolve(&profiles);
    let mut reversed_profiles = profiles.clone();
    reversed_profiles.reverse();
    assert_eq!(forward, resolver.resolve(&reversed_profiles));
    assert_eq!(forward, resolver.resolve(&profiles));

    assert_eq!(forward.target.as_deref(), Some("tfopwg_disp"));
    assert!(forward.temperature.contains("st_teff"));
    assert!(!forward.temperature.contains("pl_eqt"));
}

#[test]
fn test_tess_harmonization() {
    let config = PipelineConfig {
        min_populated: 10,
        ..Default::default()
    };
    let text = tess_export(70);
    let raw = HeaderLocator::from_config(&config).locate(&text).unwrap();
    let resolved = ColumnResolver::from_config(&config).resolve(&ColumnProfile::from_frame(&raw.frame));
    let table = SchemaHarmonizer::new(TemperaturePreference::Stellar)
        .harmonize(&raw, &resolved)
        .unwrap();

    assert_eq!(raw.header_offset, 4);
    assert_eq!(table.mission, "tess");
    // "IS" is not a recognized disposition
    assert_eq!(table.dropped_rows, 10);
    assert_eq!(table.n_rows(), 60);
    assert_eq!(&table.labels[..6], &[
        Label::Confirmed,
        Label::Candidate,
        Label::NotPlanet,
        Label::Confirmed,
        Label::Candidate,
        Label::NotPlanet,
    ]);

    // the uncertainty column never replaces the measured radius
    assert_eq!(table.sources["planet_radius"], "pl_rade");
    assert_eq!(table.identifier.as_ref().unwrap().name, "toi");
    assert_eq!(
        table.feature_set.names(),
        &[
            "orbital_period",
            "planet_radius",
            "stellar_temp",
            "planet_radius_sq",
            "stellar_temp_x_planet_rad",
            "stellar_temp_div_planet_rad",
        ]
    );
    assert_eq!(
        table.engineered,
        vec![
            "planet_radius_sq",
            "stellar_temp_x_planet_rad",
            "stellar_temp_div_planet_rad",
        ]
    );
    assert!(table.features.get_columns().iter().all(|c| c.null_count() == 0));
}
