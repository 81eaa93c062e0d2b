use std::sync::{Arc, Mutex};

/// Records every undo transaction the inspector opens. Transactions are
/// scoped: dropping the handle closes them, so a panic or early return can
/// never leave one dangling.
#[derive(Clone, Default)]
pub struct TransactionLog {
    inner: Arc<Mutex<LogInner>>,
}

#[derive(Default)]
struct LogInner {
    opened: Vec<String>,
    closed: Vec<String>,
    open_count: usize,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, name: &str) -> ScopedTransaction {
        if let Ok(mut inner) = self.inner.lock() {
            inner.opened.push(name.to_string());
            inner.open_count += 1;
        }
        ScopedTransaction { name: name.to_string(), log: self.clone() }
    }

    fn close(&self, name: &str) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.closed.push(name.to_string());
            inner.open_count = inner.open_count.saturating_sub(1);
        }
    }

    pub fn open_count(&self) -> usize {
        self.inner.lock().map(|i| i.open_count).unwrap_or(0)
    }

    pub fn opened(&self) -> Vec<String> {
        self.inner.lock().map(|i| i.opened.clone()).unwrap_or_default()
    }

    pub fn closed(&self) -> Vec<String> {
        self.inner.lock().map(|i| i.closed.clone()).unwrap_or_default()
    }
}

pub struct ScopedTransaction {
    name: String,
    log: TransactionLog,
}

impl ScopedTransaction {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for ScopedTransaction {
    fn drop(&mut self) {
        self.log.close(&self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_a_transaction_closes_it() {
        let log = TransactionLog::new();
        {
            let _t = log.begin("Attach Component(s)");
            assert_eq!(log.open_count(), 1);
        }
        assert_eq!(log.open_count(), 0);
        assert_eq!(log.opened(), vec!["Attach Component(s)".to_string()]);
        assert_eq!(log.closed(), vec!["Attach Component(s)".to_string()]);
    }
}
