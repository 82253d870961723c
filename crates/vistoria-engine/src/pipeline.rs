use anyhow::{bail, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use vistoria_contracts::events::{EventPayload, EventWriter};
use vistoria_contracts::inspection::{
    report_pdf_key, report_txt_key, upload_key, CombinedAnalysis, ImageAnalysis, ReportLocators,
    SessionState,
};

use crate::provider::{AnalysisProvider, ANSWER_APOLOGY};
use crate::report::{render_pdf_report, render_txt_digest};
use crate::resolver::resolve;
use crate::storage::BlobStore;

const LOCATOR_TTL_SECONDS: u64 = 3600;

/// What one completed inspection run produced.
#[derive(Debug, Clone)]
pub struct InspectionOutcome {
    pub combined: CombinedAnalysis,
    pub locators: ReportLocators,
    /// Human-readable notes for every step that degraded to the offline
    /// tier, in pipeline order. Empty when the primary tier handled
    /// everything.
    pub degradations: Vec<String>,
}

/// Sequences one inspection: store each image, analyze it (primary tier
/// first, offline on any failure), combine, render and persist the report
/// artifacts. Per-image and combination failures degrade; rendering and
/// storage failures are fatal for the run.
pub struct InspectionPipeline {
    primary: Box<dyn AnalysisProvider>,
    fallback: Box<dyn AnalysisProvider>,
    store: Box<dyn BlobStore>,
}

impl InspectionPipeline {
    pub fn new(
        primary: Box<dyn AnalysisProvider>,
        fallback: Box<dyn AnalysisProvider>,
        store: Box<dyn BlobStore>,
    ) -> Self {
        Self {
            primary,
            fallback,
            store,
        }
    }

    pub fn run(
        &self,
        session: &mut SessionState,
        events: &EventWriter,
    ) -> Result<InspectionOutcome> {
        if session.images.is_empty() {
            bail!("no images uploaded for this inspection");
        }
        let inspection_id = session.inspection_id.clone();
        events.emit(
            "inspection_started",
            payload([("images", Value::from(session.images.len() as u64))]),
        )?;

        let mut analyses: Vec<ImageAnalysis> = Vec::new();
        let mut degradations: Vec<String> = Vec::new();

        for image in &session.images {
            let key = upload_key(&inspection_id, &image.filename);
            self.store.put(&key, &image.bytes)?;
            events.emit(
                "image_stored",
                payload([
                    ("key", Value::from(key.as_str())),
                    ("sha256", Value::from(short_sha(&image.bytes))),
                ]),
            )?;

            let resolved = resolve(
                || self.primary.analyze_image(&image.bytes),
                || self.fallback.analyze_image(&image.bytes),
            )?;
            if let Some(reason) = &resolved.degraded {
                degradations.push(format!("análise de {}: {}", image.filename, reason));
                events.emit(
                    "tier_degraded",
                    payload([
                        ("stage", Value::from("analyze_image")),
                        ("filename", Value::from(image.filename.as_str())),
                        ("reason", Value::from(reason.as_str())),
                    ]),
                )?;
            }
            events.emit(
                "image_analyzed",
                payload([
                    ("filename", Value::from(image.filename.as_str())),
                    ("tier", Value::from(resolved.tier.label())),
                ]),
            )?;
            analyses.push(ImageAnalysis {
                filename: image.filename.clone(),
                text: resolved.value,
                tier: resolved.tier,
            });
        }

        let resolved = resolve(
            || self.primary.combine_analyses(&analyses),
            || self.fallback.combine_analyses(&analyses),
        )?;
        if let Some(reason) = &resolved.degraded {
            degradations.push(format!("análise combinada: {reason}"));
            events.emit(
                "tier_degraded",
                payload([
                    ("stage", Value::from("combine_analyses")),
                    ("reason", Value::from(reason.as_str())),
                ]),
            )?;
        }
        let combined = CombinedAnalysis {
            text: resolved.value,
            tier: Some(resolved.tier),
        };
        events.emit(
            "combined_ready",
            payload([("tier", Value::from(resolved.tier.label()))]),
        )?;

        // From here on nothing degrades: a rendering or storage failure
        // aborts the run.
        let pdf_bytes = render_pdf_report(&inspection_id, &session.images, &combined.text)?;
        let digest = render_txt_digest(&combined.text);
        let pdf_key = report_pdf_key(&inspection_id);
        let txt_key = report_txt_key(&inspection_id);
        self.store.put(&pdf_key, &pdf_bytes)?;
        self.store.put(&txt_key, digest.as_bytes())?;
        let locators = ReportLocators {
            pdf: Some(self.store.locator(&pdf_key, LOCATOR_TTL_SECONDS)?),
            txt: Some(self.store.locator(&txt_key, LOCATOR_TTL_SECONDS)?),
        };
        events.emit(
            "report_written",
            payload([
                ("pdf", Value::from(pdf_key.as_str())),
                ("txt", Value::from(txt_key.as_str())),
            ]),
        )?;

        session.analyses = analyses;
        session.combined = Some(combined.clone());
        session.report = locators.clone();

        Ok(InspectionOutcome {
            combined,
            locators,
            degradations,
        })
    }

    /// Answers a follow-up question from the session's combined analysis
    /// (providers substitute the stock analysis when none exists yet).
    /// Never fails on provider errors: a double failure yields the fixed
    /// apology, so chat keeps working while the tiers are down.
    pub fn answer(
        &self,
        session: &mut SessionState,
        events: &EventWriter,
        question: &str,
    ) -> Result<String> {
        let context = session.combined_text().unwrap_or("").to_string();
        let resolved = resolve(
            || self.primary.answer_question(question, &context),
            || self.fallback.answer_question(question, &context),
        );

        let (answer, tier_label) = match resolved {
            Ok(resolved) => {
                if let Some(reason) = &resolved.degraded {
                    events.emit(
                        "tier_degraded",
                        payload([
                            ("stage", Value::from("answer_question")),
                            ("reason", Value::from(reason.as_str())),
                        ]),
                    )?;
                }
                (resolved.value, resolved.tier.label())
            }
            Err(_) => (ANSWER_APOLOGY.to_string(), "none"),
        };
        events.emit(
            "question_answered",
            payload([("tier", Value::from(tier_label))]),
        )?;

        session.record_turn(question, answer.clone());
        Ok(answer)
    }
}

fn payload<const N: usize>(entries: [(&str, Value); N]) -> EventPayload {
    let mut map = EventPayload::new();
    for (key, value) in entries {
        map.insert(key.to_string(), value);
    }
    map
}

fn short_sha(bytes: &[u8]) -> String {
    hex::encode(&Sha256::digest(bytes)[..8])
}
