use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::{Direction, ProgressScale, ProviderKind, Translated, TranslationProvider, TranslationRequest};
use crate::config::TranslationConfig;
use crate::progress::{self, ProgressStore};
use crate::store::cache::ResourceCache;
use crate::text;
use crate::Result;

/// Importance tag for memoized chunk translations. Low enough that larger
/// artifacts can push them out under pressure.
const CHUNK_CACHE_IMPORTANCE: u8 = 3;

/// Remote web-translation provider.
///
/// Splits the text into endpoint-sized chunks, translates each against the
/// official-interface endpoint with a per-chunk fallback to the unofficial
/// one, and reassembles the pieces. A chunk both endpoints reject degrades
/// to its source text so one bad chunk cannot sink the whole translation.
/// Successful chunks are memoized in the resource cache, so a retried or
/// re-submitted text does not hit the endpoints again.
pub struct RemoteTranslator {
    client: reqwest::Client,
    primary_endpoint: String,
    fallback_endpoint: String,
    chunk_size: usize,
    inter_chunk_delay: Duration,
    progress: Arc<dyn ProgressStore>,
    resources: Arc<ResourceCache>,
}

impl RemoteTranslator {
    pub fn new(
        config: &TranslationConfig,
        resources: Arc<ResourceCache>,
        progress: Arc<dyn ProgressStore>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            primary_endpoint: config.primary_endpoint.clone(),
            fallback_endpoint: config.fallback_endpoint.clone(),
            chunk_size: config.chunk_size,
            inter_chunk_delay: Duration::from_millis(config.inter_chunk_delay_ms),
            progress,
            resources,
        }
    }

    async fn translate_chunk(&self, chunk: &str, source: &str, target: &str) -> Result<String> {
        let cache_key = chunk_cache_key(source, target, chunk);
        if let Some(cached) = self.resources.get(&cache_key) {
            if let Some(translated) = cached.as_str() {
                tracing::debug!("Chunk translation served from cache");
                return Ok(translated.to_string());
            }
        }

        let translated = match self.request_primary(chunk, source, target).await {
            Ok(translated) => translated,
            Err(primary_err) => {
                tracing::warn!("Primary translation endpoint failed: {:#}", primary_err);
                self.request_fallback(chunk, source, target).await?
            }
        };

        self.resources.insert(
            &cache_key,
            Value::String(translated.clone()),
            CHUNK_CACHE_IMPORTANCE,
        );
        Ok(translated)
    }

    async fn request_primary(&self, chunk: &str, source: &str, target: &str) -> Result<String> {
        let url = format!(
            "{}?client=gtx&sl={}&tl={}&dt=t&q={}",
            self.primary_endpoint,
            source,
            target,
            urlencoding::encode(chunk)
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("primary endpoint returned HTTP {}", response.status());
        }

        let payload: Value = response.json().await?;
        parse_primary_payload(&payload)
    }

    async fn request_fallback(&self, chunk: &str, source: &str, target: &str) -> Result<String> {
        let url = format!(
            "{}?client=dict-chrome-ex&sl={}&tl={}&q={}",
            self.fallback_endpoint,
            source,
            target,
            urlencoding::encode(chunk)
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("fallback endpoint returned HTTP {}", response.status());
        }

        let payload: Value = response.json().await?;
        parse_fallback_payload(&payload)
    }
}

#[async_trait]
impl TranslationProvider for RemoteTranslator {
    async fn translate(
        &self,
        req: &TranslationRequest,
        scale: ProgressScale,
    ) -> Result<Translated> {
        let source = provider_lang_code(&req.source_lang);
        let target = provider_lang_code(&req.target_lang);

        self.resources.sweep();

        progress::report(&*self.progress, &req.request_id, scale.apply(5), "chunking");
        let chunks = text::chunk_text(&req.text, self.chunk_size);
        let total = chunks.len();
        tracing::info!(
            "Translating {} chunks ({} -> {}) for {}",
            total,
            source,
            target,
            req.request_id
        );

        let mut translated_chunks = Vec::with_capacity(total);
        let mut degraded = 0usize;

        for (i, chunk) in chunks.iter().enumerate() {
            let percent = 10 + (80 * i / total.max(1)) as u8;
            progress::report(
                &*self.progress,
                &req.request_id,
                scale.apply(percent),
                &format!("translating chunk {}/{}", i + 1, total),
            );

            match self.translate_chunk(chunk, &source, &target).await {
                Ok(translated) => translated_chunks.push(translated),
                Err(e) => {
                    // Echo the source text rather than aborting the run.
                    tracing::warn!("Chunk {}/{} failed, keeping source text: {:#}", i + 1, total, e);
                    translated_chunks.push(chunk.clone());
                    degraded += 1;
                }
            }

            if i + 1 < total {
                tokio::time::sleep(self.inter_chunk_delay).await;
            }
        }

        if degraded == total && total > 0 {
            anyhow::bail!("every chunk failed to translate");
        }

        progress::report(&*self.progress, &req.request_id, scale.apply(92), "merging");
        let merged = translated_chunks.join(" ");

        progress::report(
            &*self.progress,
            &req.request_id,
            scale.apply(96),
            "postprocessing",
        );
        let finished = text::apply_rtl_postprocessing(&merged, &req.target_lang);

        Ok(Translated {
            translation: finished,
            direction: Direction::for_language(&req.target_lang),
            provider: ProviderKind::Remote,
        })
    }

    fn name(&self) -> &'static str {
        "google-web"
    }
}

fn chunk_cache_key(source: &str, target: &str, chunk: &str) -> String {
    format!("translation:{}:{}:{}", source, target, chunk)
}

/// Map internal language codes to what the provider expects.
pub fn provider_lang_code(code: &str) -> String {
    match code {
        // The web endpoints still use the pre-1989 code for Hebrew.
        "he" => "iw".to_string(),
        other => other.to_string(),
    }
}

/// The official-interface payload is a nested array: element 0 holds the
/// sentence segments, each with the translated text at index 0.
fn parse_primary_payload(payload: &Value) -> Result<String> {
    let segments = payload
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("unexpected primary payload shape"))?;

    let mut translated = String::new();
    for segment in segments {
        if let Some(piece) = segment.get(0).and_then(Value::as_str) {
            translated.push_str(piece);
        }
    }

    if translated.is_empty() {
        anyhow::bail!("primary payload contained no translated text");
    }
    Ok(translated)
}

/// The unofficial endpoint answers either a bare array of strings or an
/// array of [translation, detected_source] pairs.
fn parse_fallback_payload(payload: &Value) -> Result<String> {
    let items = payload
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("unexpected fallback payload shape"))?;

    let mut translated = String::new();
    for item in items {
        match item {
            Value::String(piece) => translated.push_str(piece),
            Value::Array(pair) => {
                if let Some(piece) = pair.first().and_then(Value::as_str) {
                    translated.push_str(piece);
                }
            }
            _ => {}
        }
    }

    if translated.is_empty() {
        anyhow::bail!("fallback payload contained no translated text");
    }
    Ok(translated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lang_code_mapping() {
        assert_eq!(provider_lang_code("he"), "iw");
        assert_eq!(provider_lang_code("en"), "en");
        assert_eq!(provider_lang_code("ar"), "ar");
    }

    #[test]
    fn test_parse_primary_payload() {
        let payload: Value = serde_json::from_str(
            r#"[[["Bonjour ","Hello ",null,null,10],["le monde","world",null,null,10]],null,"en"]"#,
        )
        .unwrap();
        assert_eq!(parse_primary_payload(&payload).unwrap(), "Bonjour le monde");
    }

    #[test]
    fn test_parse_primary_payload_rejects_garbage() {
        let payload: Value = serde_json::from_str(r#"{"error": 403}"#).unwrap();
        assert!(parse_primary_payload(&payload).is_err());
    }

    #[test]
    fn test_parse_fallback_payload_strings() {
        let payload: Value = serde_json::from_str(r#"["Hola mundo"]"#).unwrap();
        assert_eq!(parse_fallback_payload(&payload).unwrap(), "Hola mundo");
    }

    #[test]
    fn test_parse_fallback_payload_pairs() {
        let payload: Value = serde_json::from_str(r#"[["Hola mundo","en"]]"#).unwrap();
        assert_eq!(parse_fallback_payload(&payload).unwrap(), "Hola mundo");
    }

    #[test]
    fn test_parse_fallback_payload_rejects_empty() {
        let payload: Value = serde_json::from_str(r#"[]"#).unwrap();
        assert!(parse_fallback_payload(&payload).is_err());
    }

    fn offline_translator(resources: Arc<ResourceCache>) -> RemoteTranslator {
        let mut config = crate::config::Config::default().translation;
        // Nothing listens here; requests fail fast without real traffic.
        config.primary_endpoint = "http://127.0.0.1:9/translate_a/single".to_string();
        config.fallback_endpoint = "http://127.0.0.1:9/translate_a/t".to_string();
        config.inter_chunk_delay_ms = 0;
        config.request_timeout_secs = 1;

        let progress: Arc<dyn ProgressStore> =
            Arc::new(crate::progress::MemoryProgressStore::new());
        RemoteTranslator::new(&config, resources, progress)
    }

    #[tokio::test]
    async fn test_cached_chunk_avoids_endpoints() {
        let resources = Arc::new(ResourceCache::new(1024 * 1024, 24));
        resources.insert(
            &chunk_cache_key("en", "iw", "hello world"),
            Value::String("שלום עולם".to_string()),
            CHUNK_CACHE_IMPORTANCE,
        );

        let translator = offline_translator(resources);
        let req = TranslationRequest {
            text: "hello world".to_string(),
            source_lang: "en".to_string(),
            target_lang: "he".to_string(),
            request_id: crate::resolver::new_request_id(),
        };

        let translated = translator
            .translate(&req, ProgressScale::full())
            .await
            .expect("cached chunk should translate without network");
        assert!(translated.translation.contains("שלום עולם"));
        assert_eq!(translated.direction, Direction::Rtl);
    }

    #[tokio::test]
    async fn test_unreachable_endpoints_fail_whole_translation() {
        let resources = Arc::new(ResourceCache::new(1024 * 1024, 24));
        let translator = offline_translator(resources);
        let req = TranslationRequest {
            text: "hello world".to_string(),
            source_lang: "en".to_string(),
            target_lang: "he".to_string(),
            request_id: crate::resolver::new_request_id(),
        };

        // Every chunk degrading means the provider as a whole failed, so
        // the caller can move on to its next provider.
        assert!(translator.translate(&req, ProgressScale::full()).await.is_err());
    }
}
