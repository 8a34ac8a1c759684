use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Counting semaphore bounding the number of in-flight requests.
///
/// When every permit is out the dispatcher parks on [`AdmissionController::acquire`], which is
/// what throttles the paced rate once the target slows down.
#[derive(Clone)]
pub struct AdmissionController {
    permits: Arc<Semaphore>,
    max: usize,
}

/// One admitted request. The permit returns to the controller when this is dropped.
#[must_use]
pub struct Admission {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionController {
    pub fn new(max_connections: usize) -> Self {
        let max = max_connections.min(Semaphore::MAX_PERMITS);
        Self {
            permits: Arc::new(Semaphore::new(max)),
            max,
        }
    }

    pub async fn acquire(&self) -> Result<Admission, AcquireError> {
        let permit = self.permits.clone().acquire_owned().await?;
        Ok(Admission { _permit: permit })
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.max - self.available()
    }

    pub fn max(&self) -> usize {
        self.max
    }
}
