use simpleq::config::Config;
use simpleq::error::Error;

const ENV_VARS: [&str; 6] = [
    "SIMPLEQ_PRODUCERS",
    "SIMPLEQ_CONSUMERS",
    "SIMPLEQ_ITEMS",
    "SIMPLEQ_QUEUE",
    "LOG_LEVEL",
    "OTEL_ENDPOINT",
];

fn clear_env() {
    for name in ENV_VARS {
        unsafe {
            std::env::remove_var(name);
        }
    }
}

// Environment variables are process-global, so every env-dependent check
// lives in this one test.
#[test]
fn config_env_overrides() {
    clear_env();
    let config = Config::from_env().unwrap();
    assert_eq!(config, Config::default());

    unsafe {
        std::env::set_var("SIMPLEQ_PRODUCERS", "3");
        std::env::set_var("SIMPLEQ_CONSUMERS", " 5 ");
        std::env::set_var("SIMPLEQ_QUEUE", "ingest");
        std::env::set_var("OTEL_ENDPOINT", "http://localhost:4317");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.producers, 3);
    assert_eq!(config.consumers, 5);
    assert_eq!(config.queue_name, "ingest");
    assert_eq!(config.otel_endpoint.as_deref(), Some("http://localhost:4317"));

    // Environment wins over the file.
    let path = std::env::temp_dir().join(format!("simpleq-config-{}.toml", std::process::id()));
    std::fs::write(&path, "producers = 7\nitems_per_producer = 100\n").unwrap();
    let config = Config::load(&path).unwrap();
    assert_eq!(config.producers, 3);
    assert_eq!(config.items_per_producer, 100);
    std::fs::remove_file(&path).unwrap();

    unsafe {
        std::env::set_var("SIMPLEQ_ITEMS", "lots");
    }
    let err = Config::from_env().unwrap_err();
    assert!(matches!(err, Error::Config(ref msg) if msg.contains("SIMPLEQ_ITEMS")));

    clear_env();
}

#[test]
fn config_from_toml_keeps_defaults_for_missing_keys() {
    let config = Config::from_toml("consumers = 4\nqueue_name = \"jobs\"").unwrap();
    assert_eq!(config.consumers, 4);
    assert_eq!(config.queue_name, "jobs");
    assert_eq!(config.producers, Config::default().producers);
    assert_eq!(config.total_items(), 10);
}

#[test]
fn config_from_toml_rejects_unknown_keys() {
    let result = Config::from_toml("capacity = 16");
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn config_load_missing_file_is_io_error() {
    let result = Config::load(std::path::Path::new("/nonexistent/simpleq.toml"));
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn config_validate_requires_workers() {
    let no_producers = Config {
        producers: 0,
        ..Config::default()
    };
    assert!(no_producers.validate().is_err());

    let no_consumers = Config {
        consumers: 0,
        ..Config::default()
    };
    assert!(no_consumers.validate().is_err());

    assert!(Config::default().validate().is_ok());
}

#[test]
fn config_validate_rejects_overflowing_shape() {
    let config = Config {
        producers: 4,
        items_per_producer: u64::MAX / 2,
        ..Config::default()
    };
    assert!(matches!(config.validate(), Err(Error::Config(_))));
    assert_eq!(config.total_items(), u64::MAX);

    let fits = Config {
        producers: 1,
        items_per_producer: u64::MAX,
        ..Config::default()
    };
    assert!(fits.validate().is_ok());
}
