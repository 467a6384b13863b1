use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod local;
pub mod remote;

use crate::progress::{self, ProgressStore};
use crate::text;
use crate::Result;

/// One translation request flowing through a provider.
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub request_id: String,
}

/// Base text direction of the translated output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ltr,
    Rtl,
}

impl Direction {
    pub fn for_language(lang: &str) -> Self {
        if text::is_rtl_language(lang) {
            Direction::Rtl
        } else {
            Direction::Ltr
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Ltr => "ltr",
            Direction::Rtl => "rtl",
        }
    }
}

/// Which provider produced a translation. Stored transcripts are
/// quality-tagged by provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Remote,
    Local,
    Placeholder,
}

/// A completed translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translated {
    pub translation: String,
    pub direction: Direction,
    pub provider: ProviderKind,
}

/// Maps a provider's 0-100 progress into the slice of the overall pipeline
/// the translation stage occupies.
#[derive(Debug, Clone, Copy)]
pub struct ProgressScale {
    pub base: u8,
    pub span: u8,
}

impl ProgressScale {
    /// Full-range scale for standalone translation requests.
    pub fn full() -> Self {
        Self { base: 0, span: 100 }
    }

    pub fn apply(&self, percent: u8) -> u8 {
        self.base
            .saturating_add((percent.min(100) as u32 * self.span as u32 / 100) as u8)
    }
}

/// A translation backend: remote web endpoint or local model process.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate(&self, req: &TranslationRequest, scale: ProgressScale)
        -> Result<Translated>;

    fn name(&self) -> &'static str;
}

/// Shown instead of an empty result when every provider has failed, in the
/// language the user asked for.
pub fn placeholder_translation(target_lang: &str) -> String {
    match target_lang {
        "he" | "iw" => "התרגום אינו זמין כרגע. אנא נסו שוב מאוחר יותר.",
        "ar" => "الترجمة غير متاحة حاليا. يرجى المحاولة مرة أخرى لاحقا.",
        "ru" => "Перевод временно недоступен. Пожалуйста, попробуйте позже.",
        "es" => "La traducción no está disponible en este momento. Inténtalo de nuevo más tarde.",
        "fr" => "La traduction n'est pas disponible pour le moment. Veuillez réessayer plus tard.",
        "de" => "Die Übersetzung ist derzeit nicht verfügbar. Bitte versuchen Sie es später erneut.",
        "it" => "La traduzione non è al momento disponibile. Riprova più tardi.",
        _ => "Translation is currently unavailable. Please try again later.",
    }
    .to_string()
}

/// The translation stage: a preferred provider with fallback to the other,
/// and a localized placeholder as the last resort so the caller always gets
/// text back.
pub struct TranslationStage {
    local: Option<Arc<dyn TranslationProvider>>,
    remote: Arc<dyn TranslationProvider>,
    progress: Arc<dyn ProgressStore>,
}

impl TranslationStage {
    pub fn new(config: &crate::config::Config, progress: Arc<dyn ProgressStore>) -> Self {
        let resources = Arc::new(crate::store::cache::ResourceCache::new(
            config.cache.resource_max_size_bytes,
            config.cache.resource_ttl_hours,
        ));
        let remote: Arc<dyn TranslationProvider> = Arc::new(remote::RemoteTranslator::new(
            &config.translation,
            resources,
            progress.clone(),
        ));

        let local: Option<Arc<dyn TranslationProvider>> =
            config.tools.translator_script.as_ref().map(|script| {
                Arc::new(local::LocalModelTranslator::new(
                    &config.tools.python_path,
                    script,
                    config.tools.translate_timeout_secs,
                    progress.clone(),
                )) as Arc<dyn TranslationProvider>
            });

        Self {
            local,
            remote,
            progress,
        }
    }

    pub fn with_providers(
        local: Option<Arc<dyn TranslationProvider>>,
        remote: Arc<dyn TranslationProvider>,
        progress: Arc<dyn ProgressStore>,
    ) -> Self {
        Self {
            local,
            remote,
            progress,
        }
    }

    /// Translate, preferring the local model when requested and configured.
    ///
    /// Never fails: provider errors degrade to the other provider and
    /// finally to a localized placeholder.
    pub async fn translate(&self, req: &TranslationRequest, scale: ProgressScale) -> Translated {
        progress::report(
            &*self.progress,
            &req.request_id,
            scale.apply(0),
            "translation started",
        );

        if req.text.trim().is_empty() || req.source_lang == req.target_lang {
            progress::report(&*self.progress, &req.request_id, scale.apply(100), "done");
            return Translated {
                translation: req.text.clone(),
                direction: Direction::for_language(&req.target_lang),
                provider: ProviderKind::Remote,
            };
        }

        let mut providers: Vec<&Arc<dyn TranslationProvider>> = Vec::new();
        if let Some(local) = &self.local {
            providers.push(local);
        }
        providers.push(&self.remote);

        for provider in providers {
            match provider.translate(req, scale).await {
                Ok(translated) => {
                    progress::report(&*self.progress, &req.request_id, scale.apply(100), "done");
                    return translated;
                }
                Err(e) => {
                    tracing::warn!(
                        "Translation provider '{}' failed for {}: {:#}",
                        provider.name(),
                        req.request_id,
                        e
                    );
                }
            }
        }

        tracing::error!(
            "All translation providers failed for {}, returning placeholder",
            req.request_id
        );
        progress::report(&*self.progress, &req.request_id, scale.apply(100), "failed");
        Translated {
            translation: placeholder_translation(&req.target_lang),
            direction: Direction::for_language(&req.target_lang),
            provider: ProviderKind::Placeholder,
        }
    }

    /// Translate without the local model, for the remote-only endpoint.
    pub async fn translate_remote_only(
        &self,
        req: &TranslationRequest,
        scale: ProgressScale,
    ) -> Translated {
        match self.remote.translate(req, scale).await {
            Ok(translated) => {
                progress::report(&*self.progress, &req.request_id, scale.apply(100), "done");
                translated
            }
            Err(e) => {
                tracing::warn!("Remote translation failed for {}: {:#}", req.request_id, e);
                progress::report(&*self.progress, &req.request_id, scale.apply(100), "failed");
                Translated {
                    translation: placeholder_translation(&req.target_lang),
                    direction: Direction::for_language(&req.target_lang),
                    provider: ProviderKind::Placeholder,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::MemoryProgressStore;

    struct FixedProvider {
        name: &'static str,
        result: Option<&'static str>,
        kind: ProviderKind,
    }

    #[async_trait]
    impl TranslationProvider for FixedProvider {
        async fn translate(
            &self,
            req: &TranslationRequest,
            _scale: ProgressScale,
        ) -> Result<Translated> {
            match self.result {
                Some(text) => Ok(Translated {
                    translation: text.to_string(),
                    direction: Direction::for_language(&req.target_lang),
                    provider: self.kind,
                }),
                None => anyhow::bail!("provider down"),
            }
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    fn request(target: &str) -> TranslationRequest {
        TranslationRequest {
            text: "hello world".to_string(),
            source_lang: "en".to_string(),
            target_lang: target.to_string(),
            request_id: crate::resolver::new_request_id(),
        }
    }

    #[tokio::test]
    async fn test_local_preferred_when_available() {
        let progress = Arc::new(MemoryProgressStore::new());
        let stage = TranslationStage::with_providers(
            Some(Arc::new(FixedProvider {
                name: "local",
                result: Some("מקומי"),
                kind: ProviderKind::Local,
            })),
            Arc::new(FixedProvider {
                name: "remote",
                result: Some("מרוחק"),
                kind: ProviderKind::Remote,
            }),
            progress,
        );

        let out = stage.translate(&request("he"), ProgressScale::full()).await;
        assert_eq!(out.translation, "מקומי");
        assert_eq!(out.provider, ProviderKind::Local);
        assert_eq!(out.direction, Direction::Rtl);
    }

    #[tokio::test]
    async fn test_local_failure_falls_back_to_remote() {
        let progress = Arc::new(MemoryProgressStore::new());
        let stage = TranslationStage::with_providers(
            Some(Arc::new(FixedProvider {
                name: "local",
                result: None,
                kind: ProviderKind::Local,
            })),
            Arc::new(FixedProvider {
                name: "remote",
                result: Some("hola"),
                kind: ProviderKind::Remote,
            }),
            progress,
        );

        let out = stage.translate(&request("es"), ProgressScale::full()).await;
        assert_eq!(out.translation, "hola");
        assert_eq!(out.provider, ProviderKind::Remote);
        assert_eq!(out.direction, Direction::Ltr);
    }

    #[tokio::test]
    async fn test_both_failing_yields_localized_placeholder() {
        let progress = Arc::new(MemoryProgressStore::new());
        let stage = TranslationStage::with_providers(
            Some(Arc::new(FixedProvider {
                name: "local",
                result: None,
                kind: ProviderKind::Local,
            })),
            Arc::new(FixedProvider {
                name: "remote",
                result: None,
                kind: ProviderKind::Remote,
            }),
            progress.clone(),
        );

        let req = request("he");
        let out = stage.translate(&req, ProgressScale::full()).await;
        assert_eq!(out.provider, ProviderKind::Placeholder);
        assert_eq!(out.translation, placeholder_translation("he"));

        use crate::progress::ProgressStore;
        assert_eq!(progress.get(&req.request_id).step, "failed");
    }

    #[tokio::test]
    async fn test_same_language_passes_through() {
        let progress = Arc::new(MemoryProgressStore::new());
        let stage = TranslationStage::with_providers(
            None,
            Arc::new(FixedProvider {
                name: "remote",
                result: None,
                kind: ProviderKind::Remote,
            }),
            progress,
        );

        let mut req = request("en");
        req.source_lang = "en".to_string();
        let out = stage.translate(&req, ProgressScale::full()).await;
        assert_eq!(out.translation, "hello world");
    }

    #[test]
    fn test_progress_scale() {
        let scale = ProgressScale { base: 70, span: 25 };
        assert_eq!(scale.apply(0), 70);
        assert_eq!(scale.apply(100), 95);
        assert_eq!(scale.apply(50), 82);
        assert_eq!(ProgressScale::full().apply(100), 100);
    }

    #[test]
    fn test_placeholder_is_localized() {
        assert!(placeholder_translation("he").contains("התרגום"));
        assert!(placeholder_translation("en").contains("unavailable"));
        assert_ne!(placeholder_translation("ru"), placeholder_translation("de"));
    }
}
