use anyhow::Result;
use vistoria_contracts::analysis::DEFAULT_ANALYSIS;
use vistoria_contracts::inspection::ImageAnalysis;

/// The three operations every analysis tier offers. `analyze_image` and
/// `combine_analyses` propagate remote failures so the resolver can
/// degrade; `answer_question` propagates too and the chat path decides
/// what the user sees.
pub trait AnalysisProvider {
    fn name(&self) -> &str;

    fn analyze_image(&self, image_bytes: &[u8]) -> Result<String>;

    fn combine_analyses(&self, analyses: &[ImageAnalysis]) -> Result<String>;

    fn answer_question(&self, question: &str, analysis_text: &str) -> Result<String>;
}

pub const ANALYZE_IMAGE_PROMPT: &str = "\
Você é um especialista em vistoria veicular. Analise esta imagem de um \
veículo e forneça:

1. Identificação do veículo (tipo, marca, modelo, cor)
2. Localização dos danos (para-choque, porta, capô, etc.)
3. Tipo de dano (amassado, arranhão, quebrado, etc.)
4. Severidade do dano (leve, moderado, grave)
5. Possível impacto na estrutura do veículo
6. Estimativa de peças afetadas

Forneça uma análise técnica e detalhada como um especialista em vistoria \
veicular. Seja preciso na identificação do veículo e dos danos com base no \
que você realmente vê na imagem.";

pub fn combine_prompt(analyses: &[ImageAnalysis]) -> String {
    let mut analyses_text = String::new();
    for item in analyses {
        analyses_text.push_str(&format!(
            "Análise da imagem {}:\n{}\n\n",
            item.filename, item.text
        ));
    }

    format!(
        "Com base nas seguintes análises individuais de imagens de um \
veículo com avarias:

{analyses_text}
Gere um relatório técnico completo e consolidado que:
1. Resuma todos os danos encontrados no veículo
2. Classifique a severidade geral da batida (leve, moderada, grave)
3. Identifique todas as peças afetadas
4. Avalie o possível impacto na estrutura do veículo
5. Forneça uma conclusão técnica sobre a condição geral do veículo

Seu relatório deve ser detalhado, técnico e organizado em seções claras \
com o título \"RELATÓRIO DE VISTORIA VEICULAR\".
Use apenas as informações das análises fornecidas, sem adicionar detalhes \
fictícios."
    )
}

pub fn question_prompt(question: &str, analysis_text: &str) -> String {
    // An empty context would let the model invent a vehicle; use the stock
    // analysis instead.
    let context = if analysis_text.trim().is_empty() {
        DEFAULT_ANALYSIS
    } else {
        analysis_text
    };

    format!(
        "Você é um especialista em vistoria veicular. Com base na seguinte \
análise de um veículo com avarias:

{context}

Responda à seguinte pergunta do usuário de forma técnica e precisa:

{question}

Importante: Responda apenas com base nas informações contidas na análise \
acima. Se a informação não estiver presente na análise, diga que não possui \
essa informação específica. Não invente detalhes que não estejam na análise."
    )
}

/// Fixed reply when no tier manages to answer a question.
pub const ANSWER_APOLOGY: &str = "Desculpe, ocorreu um erro ao processar sua \
pergunta. Por favor, tente novamente mais tarde.";
