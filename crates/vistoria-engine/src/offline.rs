use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use vistoria_contracts::analysis::{
    AnalysisSummary, DamageKind, DamageZone, Severity, VehicleIdentity, DEFAULT_ANALYSIS,
};
use vistoria_contracts::inspection::ImageAnalysis;

use crate::provider::AnalysisProvider;

const CAR_TYPES: [&str; 5] = ["Sedan", "SUV", "Hatchback", "Pickup", "Minivan"];
const CAR_BRANDS: [&str; 10] = [
    "Toyota",
    "Honda",
    "Ford",
    "Chevrolet",
    "Volkswagen",
    "Hyundai",
    "Nissan",
    "BMW",
    "Mercedes-Benz",
    "Audi",
];
const CAR_COLORS: [&str; 10] = [
    "preto", "branco", "prata", "cinza", "vermelho", "azul", "verde", "amarelo", "marrom",
    "laranja",
];
const DAMAGE_LOCATIONS: [&str; 11] = [
    "para-choque dianteiro",
    "para-choque traseiro",
    "porta dianteira",
    "porta traseira",
    "capô",
    "teto",
    "porta-malas",
    "lateral esquerda",
    "lateral direita",
    "farol",
    "lanterna",
];
const DAMAGE_TYPES: [&str; 6] = [
    "amassado",
    "arranhão",
    "quebrado",
    "trincado",
    "perfurado",
    "deformado",
];
const SEVERITIES: [Severity; 3] = [Severity::Leve, Severity::Moderado, Severity::Grave];

/// Offline analysis tier. No network dependency: every selection is drawn
/// from one generator seeded by the image fingerprint, so repeated calls on
/// the same bytes produce byte-identical text.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineProvider;

impl OfflineProvider {
    pub fn new() -> Self {
        Self
    }
}

/// Stable fingerprint over the first 100 bytes of the image, the key for
/// every deterministic selection below.
pub fn fingerprint(image_bytes: &[u8]) -> u64 {
    let prefix = &image_bytes[..image_bytes.len().min(100)];
    let digest = Sha256::digest(prefix);
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

impl AnalysisProvider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    fn analyze_image(&self, image_bytes: &[u8]) -> Result<String> {
        let seed = fingerprint(image_bytes);
        let mut rng = StdRng::seed_from_u64(seed);

        let car_type = CAR_TYPES[(seed % CAR_TYPES.len() as u64) as usize];
        let car_brand = CAR_BRANDS[(seed % CAR_BRANDS.len() as u64) as usize];
        let car_color = CAR_COLORS[(seed % CAR_COLORS.len() as u64) as usize];
        let severity = SEVERITIES[(seed % SEVERITIES.len() as u64) as usize];

        let damage_count = 1 + (seed % 3) as usize;
        let locations: Vec<&str> = DAMAGE_LOCATIONS
            .choose_multiple(&mut rng, damage_count)
            .copied()
            .collect();
        let types: Vec<&str> = (0..damage_count)
            .map(|_| DAMAGE_TYPES[rng.gen_range(0..DAMAGE_TYPES.len())])
            .collect();

        let mut analysis = String::from("# Análise de Veículo\n\n");
        analysis.push_str("## Identificação do Veículo\n");
        analysis.push_str(&format!("- Tipo: {car_type}\n"));
        analysis.push_str(&format!("- Marca: {car_brand}\n"));
        analysis.push_str(&format!("- Cor: {car_color}\n\n"));

        analysis.push_str("## Danos Identificados\n");
        for (location, damage_type) in locations.iter().zip(&types) {
            analysis.push_str(&format!("- {}: {damage_type}\n", capitalize(location)));
        }

        analysis.push_str("\n## Severidade dos Danos\n");
        analysis.push_str(&format!(
            "A severidade geral dos danos é classificada como {}.\n\n",
            severity.label().to_uppercase()
        ));

        analysis.push_str("## Impacto Estrutural\n");
        analysis.push_str(structural_note(severity));
        analysis.push_str("\n\n");

        analysis.push_str("## Peças Afetadas\n");
        for location in &locations {
            analysis.push_str(&format!("- {}\n", capitalize(location)));
        }

        Ok(analysis)
    }

    fn combine_analyses(&self, analyses: &[ImageAnalysis]) -> Result<String> {
        if analyses.is_empty() {
            bail!("no per-image analyses to combine");
        }

        let summaries: Vec<AnalysisSummary> = analyses
            .iter()
            .map(|item| AnalysisSummary::parse(&item.text))
            .collect();

        let identity = summaries
            .iter()
            .find_map(|summary| summary.identity.clone())
            .unwrap_or_default();
        let severity = Severity::worst(summaries.iter().filter_map(|summary| summary.severity))
            .unwrap_or(Severity::Moderado);

        let zones: Vec<DamageZone> = DamageZone::ALL
            .into_iter()
            .filter(|zone| summaries.iter().any(|summary| summary.zones().contains(zone)))
            .collect();
        let kinds: Vec<DamageKind> = DamageKind::ALL
            .into_iter()
            .filter(|kind| summaries.iter().any(|summary| summary.kinds().contains(kind)))
            .collect();

        let mut affected: Vec<String> = Vec::new();
        for summary in &summaries {
            for damage in &summary.damages {
                if !affected.contains(&damage.location) {
                    affected.push(damage.location.clone());
                }
            }
        }

        Ok(render_combined_report(
            &identity, severity, &zones, &kinds, &affected,
        ))
    }

    fn answer_question(&self, question: &str, analysis_text: &str) -> Result<String> {
        let context = if analysis_text.trim().is_empty() {
            DEFAULT_ANALYSIS
        } else {
            analysis_text
        };
        Ok(answer_from_table(question, context))
    }
}

fn structural_note(severity: Severity) -> &'static str {
    match severity {
        Severity::Leve => {
            "Não foram identificados danos estruturais significativos. Os danos \
são principalmente cosméticos."
        }
        Severity::Moderado => {
            "Possível comprometimento de componentes secundários, mas sem afetar \
a estrutura principal do veículo."
        }
        Severity::Grave => {
            "Há indícios de comprometimento estrutural que podem afetar a \
segurança do veículo. Recomenda-se uma inspeção detalhada."
        }
    }
}

fn render_combined_report(
    identity: &VehicleIdentity,
    severity: Severity,
    zones: &[DamageZone],
    kinds: &[DamageKind],
    affected: &[String],
) -> String {
    let mut report = String::from("# RELATÓRIO DE VISTORIA VEICULAR\n\n");

    report.push_str("## Resumo dos Danos\n");
    report.push_str(&format!(
        "O veículo {} {}, cor {}, apresenta danos ",
        identity.brand, identity.kind, identity.color
    ));
    if zones.is_empty() {
        report.push_str("em diversas áreas do veículo. ");
    } else {
        let phrases: Vec<&str> = zones.iter().map(DamageZone::phrase).collect();
        report.push_str(&format!(
            "concentrados principalmente {}. ",
            phrases.join(", ")
        ));
    }
    if kinds.is_empty() {
        report.push_str("Foram identificados danos de intensidade variada.\n\n");
    } else {
        let phrases: Vec<&str> = kinds.iter().map(DamageKind::phrase).collect();
        report.push_str(&format!(
            "Foram identificados {} de intensidade variada.\n\n",
            phrases.join(", ")
        ));
    }

    report.push_str("## Classificação da Severidade\n");
    report.push_str(&format!(
        "A batida é classificada como de severidade {}",
        severity.classification()
    ));
    report.push_str(match severity {
        Severity::Grave => {
            ", com danos significativos que podem comprometer componentes \
estruturais e de segurança do veículo.\n\n"
        }
        Severity::Moderado => {
            ", com danos visíveis que requerem substituição de peças, porém sem \
comprometimento estrutural grave.\n\n"
        }
        Severity::Leve => {
            ", com danos superficiais que requerem principalmente reparos \
cosméticos.\n\n"
        }
    });

    report.push_str("## Peças Afetadas\n");
    if affected.is_empty() {
        report.push_str("- Componentes externos da carroceria\n");
    } else {
        for part in affected {
            report.push_str(&format!("- {part}\n"));
        }
    }

    report.push_str("\n## Impacto Estrutural\n");
    report.push_str(match severity {
        Severity::Grave => {
            "Há indícios de possível comprometimento estrutural que requerem uma \
avaliação detalhada por especialistas. Recomenda-se verificação do chassi e \
pontos de fixação dos componentes de segurança.\n\n"
        }
        _ => {
            "Não foram identificados danos ao chassi ou à estrutura principal do \
veículo. Os danos estão limitados a componentes externos e de absorção de \
impacto, cumprindo sua função de proteção.\n\n"
        }
    });

    report.push_str("## Conclusão Técnica\n");
    report.push_str(&format!(
        "O veículo {} {} sofreu danos de severidade {}, ",
        identity.brand,
        identity.kind,
        severity.label()
    ));
    report.push_str(match severity {
        Severity::Grave => {
            "que podem comprometer a segurança e funcionalidade do veículo. \
Recomenda-se uma avaliação detalhada por especialistas antes de qualquer \
reparo."
        }
        Severity::Moderado => {
            "resultando em danos cosméticos e funcionais que requerem reparos, \
mas não comprometem a segurança estrutural. Recomenda-se a substituição das \
peças afetadas e verificação detalhada dos sistemas relacionados."
        }
        Severity::Leve => {
            "resultando principalmente em danos cosméticos que requerem reparos \
simples. O veículo mantém sua integridade estrutural e funcional."
        }
    });

    report
}

/// Keyword decision table for offline Q&A. Canned sentences where the
/// original analysis carries no signal, analysis-derived ones where it
/// does.
fn answer_from_table(question: &str, analysis_text: &str) -> String {
    let question_lower = question.to_lowercase();
    let summary = AnalysisSummary::parse(analysis_text);
    let identity = summary.identity.clone().unwrap_or_default();

    if question_lower.contains("teto") {
        return if location_mentioned(&summary, "teto") {
            "Sim, o teto do veículo apresenta danos identificados na vistoria. \
Recomenda-se avaliação do revestimento interno e das colunas de sustentação."
                .to_string()
        } else {
            "Não, o teto do veículo não foi afetado na colisão. Os danos estão \
concentrados em outras regiões do veículo."
                .to_string()
        };
    }
    if question_lower.contains("porta") && !question_lower.contains("porta-malas") {
        return if location_mentioned(&summary, "porta") {
            "Sim, há danos registrados em porta(s) do veículo. A extensão exata \
consta na lista de peças afetadas do laudo."
                .to_string()
        } else {
            "Não, as portas do veículo não apresentam danos visíveis. A colisão \
afetou principalmente outras áreas."
                .to_string()
        };
    }
    if question_lower.contains("vidro") || question_lower.contains("para-brisa")
        || question_lower.contains("parabrisa")
    {
        return "Não foram identificados danos nos vidros ou no para-brisa do \
veículo. Os danos estão concentrados em componentes metálicos e plásticos."
            .to_string();
    }
    if question_lower.contains("marca")
        || question_lower.contains("modelo")
        || question_lower.contains("fabricante")
    {
        return format!(
            "Com base nas imagens analisadas, trata-se de um veículo {} do tipo \
{}. Esta informação foi identificada pelas características visuais nas \
imagens fornecidas.",
            identity.brand, identity.kind
        );
    }
    if question_lower.contains("nível")
        || question_lower.contains("severidade")
        || question_lower.contains("gravidade")
    {
        return severity_answer(summary.severity.unwrap_or(Severity::Moderado));
    }
    if question_lower.contains("estrutura") {
        return match summary.severity {
            Some(Severity::Grave) => {
                "A análise sugere possível comprometimento estrutural. Recomendo \
uma inspeção detalhada do chassi e dos pontos de fixação dos componentes de \
segurança."
                    .to_string()
            }
            _ => {
                "A análise indica que não houve comprometimento estrutural \
significativo. Os danos estão limitados a componentes externos e de absorção \
de impacto."
                    .to_string()
            }
        };
    }
    if question_lower.contains("peça") || question_lower.contains("componente") {
        let parts: Vec<&str> = summary
            .damages
            .iter()
            .map(|damage| damage.location.as_str())
            .collect();
        return if parts.is_empty() {
            "A análise não identificou claramente todas as peças afetadas. Seria \
recomendável uma inspeção presencial mais detalhada."
                .to_string()
        } else {
            format!(
                "As principais peças afetadas identificadas na análise são: {}. \
Algumas podem necessitar substituição completa, outras podem ser reparadas, \
dependendo da extensão dos danos.",
                parts.join(", ")
            )
        };
    }
    if question_lower.contains("cor") {
        return format!(
            "O veículo analisado é da cor {}, conforme observado nas imagens da \
vistoria.",
            identity.color
        );
    }
    if question_lower.contains("ano") {
        return "Com base nas características visuais não é possível precisar o \
ano do modelo; para confirmação seria necessário verificar a documentação do \
veículo."
            .to_string();
    }

    format!(
        "Com base na análise realizada, posso informar que o veículo {} {} \
apresenta danos que requerem atenção profissional. A análise completa está \
disponível no relatório. Poderia especificar melhor sua pergunta sobre a \
vistoria?",
        identity.brand, identity.kind
    )
}

fn location_mentioned(summary: &AnalysisSummary, needle: &str) -> bool {
    summary
        .damages
        .iter()
        .any(|damage| damage.location.to_lowercase().contains(needle))
}

fn severity_answer(severity: Severity) -> String {
    match severity {
        Severity::Grave => {
            "Com base na análise das imagens, a batida foi classificada como \
GRAVE. Há danos significativos que comprometem componentes estruturais e de \
segurança do veículo."
                .to_string()
        }
        Severity::Moderado => {
            "Com base na análise das imagens, a batida foi classificada como de \
severidade MODERADA. Há danos visíveis que requerem substituição de peças, \
porém sem comprometimento estrutural grave."
                .to_string()
        }
        Severity::Leve => {
            "Com base na análise das imagens, a batida foi classificada como \
LEVE. Há danos superficiais que requerem reparos cosméticos, sem \
comprometimento funcional do veículo."
                .to_string()
        }
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
