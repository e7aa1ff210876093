use std::sync::Arc;
use std::time::Duration;

use dproc_convert::ConverterRegistry;

use crate::bus::EventPublisher;
use crate::cache::SharedCache;
use crate::datasource::DataSourceRepository;

/// Producer-side dependencies of the upload routes.
#[derive(Clone)]
pub struct UploadState {
    pub cache: SharedCache,
    pub datasources: Arc<dyn DataSourceRepository>,
    pub publisher: Arc<dyn EventPublisher>,
    pub converters: Arc<ConverterRegistry>,
    pub staging_ttl: Duration,
}
