/// Хранилище одного целого числа, переживающего перезапуск процесса
pub trait CounterStore: Send + Sync {
    /// Текущее значение; 1, если хранилище пусто или повреждено.
    fn read(&self) -> u64;

    fn write(&self, value: u64) -> std::io::Result<()>;
}
