use anyhow::Result;

/// Control surface shared by gateway connectors.
///
/// # Lifecycle
/// 1. The gateway builds the connector from its configuration
/// 2. `open()` starts the background loops
/// 3. The connector polls its sources and forwards records to storage
/// 4. `close()` signals the loops to stop
///
/// # Example
/// ```no_run
/// use request_connector::{Connector, ConverterRegistry, RequestConnector};
/// use request_connector::config::load_config;
/// use gateway::build_sink;
///
/// # async fn run() -> anyhow::Result<()> {
/// let config = load_config("request_connector.toml")?;
/// let sink = build_sink(&config.sink)?;
/// let mut connector = RequestConnector::new(config, &ConverterRegistry::with_builtins(), sink);
///
/// connector.open()?;
/// assert!(connector.is_connected());
///
/// connector.close();
/// # Ok(())
/// # }
/// ```
pub trait Connector: Send + Sync {
    /// Returns the connector name used when forwarding records.
    fn name(&self) -> &str;

    /// Starts polling. Must be called from within a tokio runtime.
    fn open(&mut self) -> Result<()>;

    /// Signals the connector to stop. Returns immediately; in-flight
    /// requests are left to finish or time out.
    fn close(&self);

    /// Returns true between `open()` and `close()`.
    fn is_connected(&self) -> bool;
}
