//! Structured view over the free-text analyses.
//!
//! Both tiers emit the same conceptual section layout; this module parses
//! that text into a small record so the combiner and the Q&A path never
//! scrape substrings out of rendered prose.

use serde::{Deserialize, Serialize};

/// Overall damage severity, ordered so that `max` picks the worst tier
/// (grave > moderado > leve).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Leve,
    Moderado,
    Grave,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Leve => "leve",
            Severity::Moderado => "moderado",
            Severity::Grave => "grave",
        }
    }

    /// Feminine uppercase form used for the overall classification of the
    /// collision ("a batida é classificada como ...").
    pub fn classification(&self) -> &'static str {
        match self {
            Severity::Leve => "LEVE",
            Severity::Moderado => "MODERADA",
            Severity::Grave => "GRAVE",
        }
    }

    /// Finds the classification token in `text`, returning the worst one
    /// present. Only the uppercase forms both tiers use for the verdict
    /// count; lowercase mentions in surrounding prose ("sem
    /// comprometimento estrutural grave") are ignored.
    pub fn find_classification(text: &str) -> Option<Severity> {
        let mut found: Option<Severity> = None;
        for (needle, severity) in [
            ("LEVE", Severity::Leve),
            ("MODERAD", Severity::Moderado),
            ("GRAVE", Severity::Grave),
        ] {
            if text.contains(needle) {
                found = Some(found.map_or(severity, |prior| prior.max(severity)));
            }
        }
        found
    }

    /// Worst severity among the inputs, or `None` when the iterator is
    /// empty.
    pub fn worst(severities: impl IntoIterator<Item = Severity>) -> Option<Severity> {
        severities.into_iter().max()
    }
}

/// Vehicle identification as reported in the first analysis of an
/// inspection. Unknown fields stay at "desconhecido".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleIdentity {
    pub kind: String,
    pub brand: String,
    pub color: String,
}

impl Default for VehicleIdentity {
    fn default() -> Self {
        Self {
            kind: "desconhecido".to_string(),
            brand: "desconhecido".to_string(),
            color: "desconhecido".to_string(),
        }
    }
}

/// One damaged location with the kind of damage observed there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageObservation {
    pub location: String,
    pub kind: String,
}

/// Coarse zone buckets used by the combined report summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageZone {
    Frontal,
    Traseira,
    Lateral,
    Teto,
}

impl DamageZone {
    pub fn phrase(&self) -> &'static str {
        match self {
            DamageZone::Frontal => "na região frontal",
            DamageZone::Traseira => "na região traseira",
            DamageZone::Lateral => "na lateral",
            DamageZone::Teto => "no teto",
        }
    }

    pub fn matches(&self, location: &str) -> bool {
        let lowered = location.to_lowercase();
        match self {
            DamageZone::Frontal => lowered.contains("dianteir") || lowered.contains("capô"),
            DamageZone::Traseira => lowered.contains("traseir") || lowered.contains("porta-malas"),
            DamageZone::Lateral => lowered.contains("lateral"),
            DamageZone::Teto => lowered.contains("teto"),
        }
    }

    pub const ALL: [DamageZone; 4] = [
        DamageZone::Frontal,
        DamageZone::Traseira,
        DamageZone::Lateral,
        DamageZone::Teto,
    ];
}

/// Coarse damage-kind buckets for the combined report summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageKind {
    Amassados,
    Arranhoes,
    Quebras,
    Trincas,
}

impl DamageKind {
    pub fn phrase(&self) -> &'static str {
        match self {
            DamageKind::Amassados => "amassados",
            DamageKind::Arranhoes => "arranhões",
            DamageKind::Quebras => "quebras",
            DamageKind::Trincas => "trincas",
        }
    }

    pub fn matches(&self, kind: &str) -> bool {
        let lowered = kind.to_lowercase();
        match self {
            DamageKind::Amassados => lowered.contains("amassado"),
            DamageKind::Arranhoes => lowered.contains("arranhão") || lowered.contains("arranhado"),
            DamageKind::Quebras => lowered.contains("quebrado"),
            DamageKind::Trincas => lowered.contains("trincado") || lowered.contains("trinca"),
        }
    }

    pub const ALL: [DamageKind; 4] = [
        DamageKind::Amassados,
        DamageKind::Arranhoes,
        DamageKind::Quebras,
        DamageKind::Trincas,
    ];
}

/// Parsed form of one analysis text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisSummary {
    #[serde(default)]
    pub identity: Option<VehicleIdentity>,
    pub damages: Vec<DamageObservation>,
    pub severity: Option<Severity>,
}

impl AnalysisSummary {
    /// Parses the labeled lines both tiers emit: `- Tipo:` / `- Marca:` /
    /// `- Cor:` for identification, `- {location}: {kind}` bullets inside
    /// the "Danos Identificados" section, and the severity sentence.
    pub fn parse(text: &str) -> Self {
        let mut identity = VehicleIdentity::default();
        let mut saw_identity = false;
        let mut damages = Vec::new();
        let mut severity: Option<Severity> = None;
        let mut in_damage_section = false;

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("##") {
                in_damage_section = trimmed.contains("Danos Identificados");
                continue;
            }

            if let Some(value) = labeled_value(trimmed, "Tipo:") {
                identity.kind = value;
                saw_identity = true;
            } else if let Some(value) = labeled_value(trimmed, "Marca:") {
                identity.brand = value;
                saw_identity = true;
            } else if let Some(value) = labeled_value(trimmed, "Cor:") {
                identity.color = value;
                saw_identity = true;
            } else if in_damage_section {
                if let Some(rest) = trimmed.strip_prefix('-') {
                    if let Some((location, kind)) = rest.split_once(':') {
                        damages.push(DamageObservation {
                            location: location.trim().to_string(),
                            kind: kind.trim().to_string(),
                        });
                    }
                }
            }

            let lowered = trimmed.to_lowercase();
            if lowered.contains("severidade") || lowered.contains("classificada como") {
                if let Some(found) = Severity::find_classification(trimmed) {
                    severity = Some(severity.map_or(found, |prior| prior.max(found)));
                }
            }
        }

        Self {
            identity: saw_identity.then_some(identity),
            damages,
            severity,
        }
    }

    /// Zones mentioned across the damage observations, in fixed order.
    pub fn zones(&self) -> Vec<DamageZone> {
        DamageZone::ALL
            .into_iter()
            .filter(|zone| {
                self.damages
                    .iter()
                    .any(|damage| zone.matches(&damage.location))
            })
            .collect()
    }

    /// Damage-kind buckets present across the observations, in fixed order.
    pub fn kinds(&self) -> Vec<DamageKind> {
        DamageKind::ALL
            .into_iter()
            .filter(|kind| self.damages.iter().any(|damage| kind.matches(&damage.kind)))
            .collect()
    }
}

fn labeled_value(line: &str, label: &str) -> Option<String> {
    let rest = line.trim_start_matches('-').trim_start();
    rest.strip_prefix(label)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Stock analysis used as Q&A context before any inspection has run.
pub const DEFAULT_ANALYSIS: &str = "\
# RELATÓRIO DE VISTORIA VEICULAR

## Resumo dos Danos
O veículo apresenta danos concentrados principalmente na região frontal, \
afetando o para-choque dianteiro e o capô. Foram identificados amassados de \
intensidade moderada e arranhões na pintura.

## Classificação da Severidade
A batida é classificada como de severidade MODERADA, com danos visíveis que \
requerem substituição de peças, porém sem comprometimento estrutural grave.

## Peças Afetadas
- Para-choque dianteiro (substituição necessária)
- Capô (reparação possível)
- Grade frontal (substituição necessária)
- Faróis (verificação recomendada)

## Impacto Estrutural
Não foram identificados danos ao chassi ou à estrutura principal do veículo. \
Os danos estão limitados a componentes externos e de absorção de impacto, \
cumprindo sua função de proteção.

## Conclusão Técnica
O veículo sofreu uma colisão frontal de impacto moderado, resultando em \
danos cosméticos e funcionais que requerem reparos, mas não comprometem a \
segurança estrutural. Recomenda-se a substituição do para-choque e \
verificação detalhada do sistema de refrigeração.";

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# Análise de Veículo

## Identificação do Veículo
- Tipo: Sedan
- Marca: Toyota
- Cor: prata

## Danos Identificados
- Para-choque dianteiro: amassado
- Lateral esquerda: arranhão

## Severidade dos Danos
A severidade geral dos danos é classificada como GRAVE.

## Peças Afetadas
- Para-choque dianteiro
- Lateral esquerda
";

    #[test]
    fn parses_identity_damages_and_severity() {
        let summary = AnalysisSummary::parse(SAMPLE);
        let identity = summary.identity.expect("identity parsed");
        assert_eq!(identity.kind, "Sedan");
        assert_eq!(identity.brand, "Toyota");
        assert_eq!(identity.color, "prata");
        assert_eq!(summary.damages.len(), 2);
        assert_eq!(summary.damages[0].location, "Para-choque dianteiro");
        assert_eq!(summary.damages[0].kind, "amassado");
        assert_eq!(summary.severity, Some(Severity::Grave));
    }

    #[test]
    fn zone_and_kind_buckets_follow_keywords() {
        let summary = AnalysisSummary::parse(SAMPLE);
        assert_eq!(
            summary.zones(),
            vec![DamageZone::Frontal, DamageZone::Lateral]
        );
        assert_eq!(
            summary.kinds(),
            vec![DamageKind::Amassados, DamageKind::Arranhoes]
        );
    }

    #[test]
    fn worst_severity_follows_grave_moderado_leve_precedence() {
        let worst = Severity::worst([Severity::Leve, Severity::Grave, Severity::Moderado]);
        assert_eq!(worst, Some(Severity::Grave));
        assert_eq!(Severity::worst([]), None);
    }

    #[test]
    fn classification_matches_uppercase_tokens_only() {
        assert_eq!(
            Severity::find_classification("classificada como de severidade MODERADA"),
            Some(Severity::Moderado)
        );
        assert_eq!(
            Severity::find_classification(
                "severidade MODERADA, porém sem comprometimento estrutural grave"
            ),
            Some(Severity::Moderado)
        );
        assert_eq!(
            Severity::find_classification("severidade LEVE em um caso, GRAVE em outro"),
            Some(Severity::Grave)
        );
        assert_eq!(Severity::find_classification("sem danos"), None);
    }

    #[test]
    fn parse_keeps_worst_severity_across_lines() {
        let summary = AnalysisSummary::parse(
            "A severidade geral dos danos é classificada como LEVE.\n\
A batida é classificada como de severidade GRAVE.",
        );
        assert_eq!(summary.severity, Some(Severity::Grave));
    }

    #[test]
    fn parse_tolerates_unstructured_primary_text() {
        let summary = AnalysisSummary::parse("O veículo tem um arranhão na porta.");
        assert!(summary.identity.is_none());
        assert!(summary.damages.is_empty());
        assert_eq!(summary.severity, None);
    }

    #[test]
    fn default_analysis_reads_as_moderate() {
        let summary = AnalysisSummary::parse(DEFAULT_ANALYSIS);
        assert_eq!(summary.severity, Some(Severity::Moderado));
    }
}
