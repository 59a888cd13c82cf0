use std::sync::Once;

static INIT: Once = Once::new();

// Installs the global fmt subscriber once; safe to call from every test.
pub fn setup_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_target(false)
            .try_init();
    });
}
