use async_trait::async_trait;

/// Загрузка сырого тела страницы по URL; кэширование не допускается.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Возвращает тело ответа или ошибку, если запрос не удался или статус не 2xx.
    async fn fetch(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}
