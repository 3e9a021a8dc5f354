use std::path::PathBuf;

use crate::*;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("bitpost-it-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// A config file on disk drives the processor's ack behaviour, and
/// environment variables win over the file.
#[test]
fn test_config_file_and_env_overrides() {
    let dir = scratch_dir("config");
    let path = dir.join("config.toml");
    std::fs::write(
        &path,
        "[processing]\nworkers = 3\nqueue_capacity = 16\n\n[acknowledgements]\nannounce = false\n",
    )
    .unwrap();

    let config = BitpostConfig::load_from(&path).unwrap();
    assert_eq!(config.processing.workers, 3);
    assert_eq!(config.processing.effective_workers(), 3);
    assert_eq!(config.processing.queue_capacity, 16);
    assert!(!config.acknowledgements.announce);

    std::env::set_var("BITPOST_PROCESSING__WORKERS", "5");
    std::env::set_var("BITPOST_ACKNOWLEDGEMENTS__ANNOUNCE", "true");
    let overridden = BitpostConfig::load_from(&path);
    std::env::remove_var("BITPOST_PROCESSING__WORKERS");
    std::env::remove_var("BITPOST_ACKNOWLEDGEMENTS__ANNOUNCE");
    let overridden = overridden.unwrap();
    assert_eq!(overridden.processing.workers, 5);
    assert_eq!(overridden.processing.queue_capacity, 16);
    assert!(overridden.acknowledgements.announce);

    let _ = std::fs::remove_dir_all(&dir);
}

/// A malformed file is reported, not silently replaced by defaults.
#[test]
fn test_malformed_config_is_an_error() {
    let dir = scratch_dir("bad-config");
    let path = dir.join("config.toml");
    std::fs::write(&path, "[processing]\nworkers = \"many\"\n").unwrap();

    let err = BitpostConfig::load_from(&path).unwrap_err();
    assert!(err.to_string().contains("failed to parse"), "{err}");

    let _ = std::fs::remove_dir_all(&dir);
}

/// The processor can be shared across threads as-is.
#[test]
fn test_processor_is_shareable() {
    fn assert_send_sync<T: Send + Sync + 'static>() {}
    assert_send_sync::<bitpost_services::ObjectProcessor>();
    assert_send_sync::<TestNode>();
}
