use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bon::Builder;
use tracing::{error, info, warn};

use crate::models::errors::RelayError;
use crate::models::types::{ChatIdentity, CorrelationId, PostCategory};
use crate::services::retry::retry_once;
use crate::traits::chat_transport::ChatTransport;
use crate::traits::counter_store::CounterStore;

pub fn current_time() -> String {
    chrono::Local::now().format("%d/%m/%Y %H:%M:%S").to_string()
}

/// Счётчик в текстовом файле: одно десятичное число
#[derive(Builder)]
pub struct FileCounterStore {
    #[builder(into)]
    path: PathBuf,
}

impl CounterStore for FileCounterStore {
    fn read(&self) -> u64 {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(1)
    }

    fn write(&self, value: u64) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, value.to_string())
    }
}

/// Единственный владелец цикла чтение-инкремент-запись идентификатора корреляции.
///
/// The mutex makes the cycle atomic within one process only; several processes
/// sharing one counter file can still hand out the same id.
pub struct CorrelationCounter {
    store: Box<dyn CounterStore>,
    last_issued: Mutex<Option<u64>>,
}

impl CorrelationCounter {
    pub fn new(store: Box<dyn CounterStore>) -> Self {
        Self { store, last_issued: Mutex::new(None) }
    }

    pub fn next(&self) -> CorrelationId {
        let mut last = match self.last_issued.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut id = self.store.read();
        // файл мог быть повреждён или откатан: внутри процесса значения не повторяются
        if let Some(prev) = *last {
            if id <= prev {
                id = prev.saturating_add(1);
            }
        }
        if let Err(e) = self.store.write(id.saturating_add(1)) {
            error!(error = %e, id, "counter: failed to persist next id");
        }
        *last = Some(id);
        CorrelationId::new(id)
    }
}

/// Служебный чат оператора
pub struct OperatorChannel {
    transport: Arc<dyn ChatTransport>,
    chat_id: i64,
    self_chat_id: Option<i64>,
}

impl OperatorChannel {
    pub fn new(transport: Arc<dyn ChatTransport>, chat_id: i64, self_chat_id: Option<i64>) -> Self {
        Self { transport, chat_id, self_chat_id }
    }

    /// Сообщения из доверенного чата не дублируются оператору.
    pub fn is_trusted(&self, chat_id: i64) -> bool {
        self.self_chat_id == Some(chat_id)
    }

    pub async fn notify(&self, text: &str) {
        let transport = &self.transport;
        let chat_id = self.chat_id;
        let res = retry_once("operator_notify", || async move {
            transport.reply(chat_id, text, None, None).await
        })
        .await;
        if let Err(e) = res {
            warn!(error = %e, "operator notification failed");
        }
    }
}

/// Журналы отказов и ошибок на диске плюс отчёты в служебный чат
#[derive(Builder)]
pub struct DiagnosticsSink {
    #[builder(into)]
    failures_log: PathBuf,
    #[builder(into)]
    errors_log: PathBuf,
    operator: Arc<OperatorChannel>,
}

impl DiagnosticsSink {
    pub fn operator(&self) -> &Arc<OperatorChannel> {
        &self.operator
    }

    /// Записывает ссылку на пост неподдерживаемого типа.
    pub fn record_unsupported(&self, id: CorrelationId, chat_id: i64, url: &str) -> std::io::Result<()> {
        let record = format!("{} id: {}\n{}\n{}\n\n", current_time(), id, chat_id, url);
        append(&self.failures_log, &record)?;
        info!(%id, %url, "unsupported content recorded");
        Ok(())
    }

    /// Фиксирует ошибку обработки: файл журнала и отчёт оператору.
    pub async fn record_error(
        &self,
        id: CorrelationId,
        identity: &ChatIdentity,
        category: Option<PostCategory>,
        url: &str,
        err: &RelayError,
    ) {
        let record = format!(
            "{} id: {}\n{}\n{}\n{}\n\n",
            current_time(),
            id,
            identity.chat_id,
            url,
            err
        );
        if let Err(e) = append(&self.errors_log, &record) {
            error!(error = %e, path = %self.errors_log.display(), "failed to append error log");
        }
        let report = format!(
            "Chat identity\n{}\nPost type: {}\nURL: {}\nError: {}",
            identity.render(),
            category.map(|c| c.to_string()).unwrap_or_default(),
            url,
            err
        );
        self.operator.notify(&report).await;
    }
}

fn append(path: &Path, record: &str) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(record.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    #[test]
    fn missing_or_corrupt_counter_reads_one() {
        let dir = TempDir::new().unwrap();
        let store = FileCounterStore::builder().path(dir.path().join("id.txt")).build();
        assert_eq!(store.read(), 1);
        fs::write(dir.path().join("id.txt"), "garbage").unwrap();
        assert_eq!(store.read(), 1);
    }

    #[test]
    fn counter_increments_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/id.txt");
        let counter = CorrelationCounter::new(Box::new(FileCounterStore::builder().path(path.clone()).build()));
        assert_eq!(counter.next().value(), 1);
        assert_eq!(counter.next().value(), 2);
        assert_eq!(fs::read_to_string(&path).unwrap(), "3");

        let reopened = CorrelationCounter::new(Box::new(FileCounterStore::builder().path(path).build()));
        assert_eq!(reopened.next().value(), 3);
    }

    #[test]
    fn counter_never_reuses_ids_after_file_rollback() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("id.txt");
        let counter = CorrelationCounter::new(Box::new(FileCounterStore::builder().path(path.clone()).build()));
        assert_eq!(counter.next().value(), 1);
        assert_eq!(counter.next().value(), 2);
        fs::remove_file(&path).unwrap();
        assert_eq!(counter.next().value(), 3);
    }

    #[test]
    fn counter_at_upper_bound_does_not_overflow() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("id.txt");
        fs::write(&path, u64::MAX.to_string()).unwrap();
        let counter = CorrelationCounter::new(Box::new(FileCounterStore::builder().path(path.clone()).build()));
        assert_eq!(counter.next().value(), u64::MAX);
        assert_eq!(counter.next().value(), u64::MAX);
        assert_eq!(fs::read_to_string(&path).unwrap(), u64::MAX.to_string());
    }

    #[test]
    fn records_are_appended() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs_fails.txt");
        append(&path, "a\n").unwrap();
        append(&path, "b\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n");
    }
}
