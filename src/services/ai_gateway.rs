// src/services/ai_gateway.rs

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::{
        lead::{LeadChannel, LeadHeat},
        triage::{ReplyDraft, TriageResult},
    },
};

pub const PRICING_NOT_ALLOWED: &str = "PRICING_NOT_ALLOWED";

const HOT_KEYWORDS: [&str; 8] = [
    "price",
    "pricing",
    "quote",
    "urgent",
    "today",
    "asap",
    "availability",
    "delivery",
];

const PRICING_KEYWORDS: [&str; 4] = ["price", "pricing", "discount", "quote"];

#[derive(Debug, Clone)]
pub struct TriageRequest<'a> {
    pub lead_id: Uuid,
    pub channel: LeadChannel,
    pub customer_message: &'a str,
}

#[derive(Debug, Clone)]
pub struct ReplyRequest<'a> {
    pub lead_id: Uuid,
    pub channel: LeadChannel,
    pub customer_message: &'a str,
    pub pricing_allowed: bool,
}

/// Classificação e rascunho de resposta. Implementações reais (LLMs)
/// entram atrás desta trait.
#[async_trait]
pub trait AiGateway: Send + Sync {
    async fn triage(&self, request: TriageRequest<'_>) -> Result<TriageResult, AppError>;

    async fn draft_reply(&self, request: ReplyRequest<'_>) -> Result<ReplyDraft, AppError>;
}

// =============================================================================
//  MOCK (regras fixas, sem rede)
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct MockAiGateway;

fn detect_language(text: &str) -> &'static str {
    if text.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c)) {
        "ar"
    } else {
        "en"
    }
}

fn mentions_any(text: &str, keywords: &[&str]) -> bool {
    let lower = text.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

#[async_trait]
impl AiGateway for MockAiGateway {
    async fn triage(&self, request: TriageRequest<'_>) -> Result<TriageResult, AppError> {
        let heat = if mentions_any(request.customer_message, &HOT_KEYWORDS) {
            LeadHeat::Hot
        } else {
            LeadHeat::Warm
        };

        Ok(TriageResult {
            language: detect_language(request.customer_message).to_string(),
            heat,
            reason: "MOCK_TRIAGE".to_string(),
            confidence: 0.55,
        })
    }

    async fn draft_reply(&self, request: ReplyRequest<'_>) -> Result<ReplyDraft, AppError> {
        let language = detect_language(request.customer_message);
        let arabic = language == "ar";

        if !request.pricing_allowed && mentions_any(request.customer_message, &PRICING_KEYWORDS) {
            let message = if arabic {
                "تم استلام استفسارك. سأقوم بتحويل طلب التسعير إلى مسؤول المبيعات للمتابعة."
            } else {
                "We received your enquiry. I will route the pricing request to our sales team to follow up."
            };
            return Ok(ReplyDraft {
                language: language.to_string(),
                message: message.to_string(),
                confidence: 0.65,
                should_escalate: true,
                escalation_reason: Some(PRICING_NOT_ALLOWED.to_string()),
            });
        }

        let message = if arabic {
            "شكرًا لتواصلك. هل يمكنك توضيح المنتج/المواصفات المطلوبة والكمية والموقع؟"
        } else {
            "Thanks for reaching out. Could you share the product/spec needed, quantity, and your location?"
        };

        Ok(ReplyDraft {
            language: language.to_string(),
            message: message.to_string(),
            confidence: 0.6,
            should_escalate: false,
            escalation_reason: None,
        })
    }
}
