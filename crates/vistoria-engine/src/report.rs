use anyhow::{anyhow, Context, Result};
use chrono::Local;
use printpdf::image_crate;
use printpdf::{
    BuiltinFont, Image as PdfImage, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference,
};
use vistoria_contracts::inspection::VehicleImage;

const PAGE_WIDTH_MM: f32 = 215.9;
const PAGE_HEIGHT_MM: f32 = 279.4;
const MARGIN_MM: f32 = 20.0;
const FOOTER_SENTENCE: &str =
    "Este relatório foi gerado automaticamente pelo sistema de vistoria veicular.";
const DIGEST_HEADER: &str = "RELATÓRIO DE VISTORIA VEICULAR - PONTOS-CHAVE";
const DIGEST_FOOTER: &str =
    "Relatório gerado automaticamente pelo sistema de vistoria veicular.";

/// One paragraph of the analysis text, classified by the `#`-heading
/// convention both tiers write.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportBlock {
    Heading(String),
    Body(String),
}

/// Splits analysis text into heading/body blocks: blank-line separated
/// paragraphs, `#`-prefixed ones become headings, `**` emphasis markers
/// are dropped.
pub fn split_blocks(analysis_text: &str) -> Vec<ReportBlock> {
    let mut blocks = Vec::new();
    for paragraph in analysis_text.split("\n\n") {
        let trimmed = paragraph.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('#') {
            let heading = trimmed.trim_start_matches('#').trim().to_string();
            blocks.push(ReportBlock::Heading(heading));
        } else {
            blocks.push(ReportBlock::Body(trimmed.replace("**", "")));
        }
    }
    blocks
}

/// Plain-text digest: the combined analysis verbatim, bracketed by a
/// timestamped header and a fixed footer line.
pub fn render_txt_digest(analysis_text: &str) -> String {
    let current_date = Local::now().format("%d/%m/%Y %H:%M:%S");
    format!(
        "{DIGEST_HEADER}\nData: {current_date}\n\n{analysis_text}\n\n---\n{DIGEST_FOOTER}\n"
    )
}

/// Recovers the verbatim analysis text from a digest produced by
/// [`render_txt_digest`].
pub fn digest_body(digest: &str) -> Option<String> {
    let rest = digest.strip_prefix(DIGEST_HEADER)?;
    let (_, after_date) = rest.split_once("\n\n")?;
    let (body, _) = after_date.rsplit_once("\n\n---\n")?;
    Some(body.to_string())
}

/// Paginated PDF: header, inspection id, timestamp, thumbnailed images in
/// a two-column flow with numbered captions, then the analysis split into
/// heading/body blocks under "LAUDO TÉCNICO".
pub fn render_pdf_report(
    inspection_id: &str,
    images: &[VehicleImage],
    analysis_text: &str,
) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(
        "RELATÓRIO DE VISTORIA VEICULAR",
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "laudo",
    );
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|err| anyhow!("pdf font setup failed: {err}"))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|err| anyhow!("pdf font setup failed: {err}"))?;

    {
        let mut writer = PageWriter {
            doc: &doc,
            layer: doc.get_page(page).get_layer(layer),
            y: PAGE_HEIGHT_MM - MARGIN_MM,
        };

        writer.text_line("RELATÓRIO DE VISTORIA VEICULAR", 18.0, &bold, 10.0);
        writer.advance(4.0);
        let current_date = Local::now().format("%d/%m/%Y %H:%M:%S");
        writer.text_line(
            &format!("ID da Vistoria: {inspection_id}"),
            10.0,
            &regular,
            5.0,
        );
        writer.text_line(&format!("Data: {current_date}"), 10.0, &regular, 5.0);
        writer.advance(6.0);

        writer.text_line("IMAGENS ANALISADAS", 14.0, &bold, 7.0);
        writer.advance(2.0);
        for (index, vehicle_image) in images.iter().enumerate() {
            let column = index % 2;
            if column == 0 {
                writer.ensure_space(58.0);
                writer.advance(48.0);
            }
            let x = MARGIN_MM + column as f32 * 95.0;
            place_thumbnail(&mut writer, vehicle_image, x)?;
            writer.caption(
                &format!("Imagem {}: {}", index + 1, vehicle_image.filename),
                x,
                &regular,
            );
        }
        writer.advance(10.0);

        writer.text_line("LAUDO TÉCNICO", 14.0, &bold, 7.0);
        writer.advance(2.0);
        for block in split_blocks(analysis_text) {
            match block {
                ReportBlock::Heading(heading) => {
                    writer.ensure_space(12.0);
                    writer.advance(3.0);
                    writer.text_line(&heading, 12.0, &bold, 6.0);
                }
                ReportBlock::Body(body) => {
                    for line in body.lines() {
                        for wrapped in wrap_text(line, 95) {
                            writer.ensure_space(8.0);
                            writer.text_line(&wrapped, 10.0, &regular, 5.0);
                        }
                    }
                    writer.advance(2.0);
                }
            }
        }

        writer.ensure_space(16.0);
        writer.advance(8.0);
        writer.text_line(FOOTER_SENTENCE, 8.0, &regular, 4.0);
    }

    doc.save_to_bytes()
        .map_err(|err| anyhow!("pdf serialization failed: {err}"))
}

struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl PageWriter<'_> {
    fn text_line(&mut self, text: &str, size: f32, font: &IndirectFontRef, advance: f32) {
        self.ensure_space(advance + 4.0);
        self.layer
            .use_text(text, size, Mm(MARGIN_MM), Mm(self.y), font);
        self.y -= advance;
    }

    fn caption(&mut self, text: &str, x: f32, font: &IndirectFontRef) {
        self.layer.use_text(text, 9.0, Mm(x), Mm(self.y), font);
    }

    fn advance(&mut self, by: f32) {
        self.y -= by;
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y - needed < MARGIN_MM {
            let (page, layer) =
                self.doc
                    .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "laudo");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT_MM - MARGIN_MM;
        }
    }
}

fn place_thumbnail(writer: &mut PageWriter<'_>, vehicle_image: &VehicleImage, x: f32) -> Result<()> {
    let decoded = image_crate::load_from_memory(&vehicle_image.bytes)
        .with_context(|| format!("decoding image {}", vehicle_image.filename))?;
    let thumbnail = decoded.thumbnail(250, 200).to_rgb8();
    let pdf_image = PdfImage::from_dynamic_image(&image_crate::DynamicImage::ImageRgb8(thumbnail));
    pdf_image.add_to_layer(
        writer.layer.clone(),
        ImageTransform {
            translate_x: Some(Mm(x)),
            translate_y: Some(Mm(writer.y + 4.0)),
            dpi: Some(150.0),
            ..Default::default()
        },
    );
    Ok(())
}

fn wrap_text(line: &str, max_chars: usize) -> Vec<String> {
    let mut wrapped = Vec::new();
    let mut current = String::new();
    for word in line.split_whitespace() {
        if !current.is_empty() && current.chars().count() + word.chars().count() + 1 > max_chars {
            wrapped.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        wrapped.push(current);
    }
    if wrapped.is_empty() {
        wrapped.push(String::new());
    }
    wrapped
}
