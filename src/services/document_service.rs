// src/services/document_service.rs

use genpdf::{elements, style, Element};
use image::Luma;
use qrcode::QrCode;

use crate::{
    common::error::AppError,
    models::cotacao::{CotacaoDetalhe, CotacaoStatus},
};

#[derive(Clone)]
pub struct DocumentService {
    fonts_dir: String,
    public_base_url: String,
}

// Endereço público da cotação (o QR code aponta para cá)
pub fn cotacao_url(public_base_url: &str, cotacao_id: uuid::Uuid) -> String {
    format!("{}/cotacoes/{}", public_base_url.trim_end_matches('/'), cotacao_id)
}

fn status_label(status: CotacaoStatus) -> &'static str {
    match status {
        CotacaoStatus::Aberta => "Aberta",
        CotacaoStatus::Fechada => "Fechada",
        CotacaoStatus::Cancelada => "Cancelada",
    }
}

fn render_error(e: impl std::fmt::Display) -> AppError {
    AppError::InternalServerError(anyhow::Error::msg(e.to_string()))
}

impl DocumentService {
    pub fn new(fonts_dir: String, public_base_url: String) -> Self {
        Self { fonts_dir, public_base_url }
    }

    /// Gera o PDF da cotação em memória. O acesso já foi checado por quem chama.
    pub fn generate_cotacao_pdf(&self, detalhe: &CotacaoDetalhe) -> Result<Vec<u8>, AppError> {
        // 1. Fonte da pasta configurada
        let font_family = genpdf::fonts::from_files(&self.fonts_dir, "Roboto", None)
            .map_err(|_| AppError::FontNotFound(format!("Fonte não encontrada na pasta {}", self.fonts_dir)))?;

        let header = &detalhe.header;
        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(format!("Cotação {}", header.id));
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(10);
        doc.set_page_decorator(decorator);

        // --- CABEÇALHO ---
        doc.push(elements::Paragraph::new("PEDIDO DE COTAÇÃO").styled(style::Style::new().bold().with_font_size(18)));
        doc.push(elements::Paragraph::new(format!("Obra: {}", detalhe.obra_nome)));
        doc.push(elements::Paragraph::new(format!("Data: {}", header.created_at.format("%d/%m/%Y"))));
        doc.push(elements::Paragraph::new(format!("Situação: {}", status_label(header.status))));
        if let Some(obs) = &header.observacoes {
            doc.push(elements::Paragraph::new(format!("Observações: {}", obs)).styled(style::Style::new().italic()));
        }

        doc.push(elements::Break::new(2));

        // --- TABELA DE ITENS ---
        // Pesos das colunas: Material (5), Unidade (1), Quantidade (2)
        let mut table = elements::TableLayout::new(vec![5, 1, 2]);
        table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));

        let style_bold = style::Style::new().bold();
        table
            .row()
            .element(elements::Paragraph::new("Material").styled(style_bold))
            .element(elements::Paragraph::new("Un.").styled(style_bold))
            .element(elements::Paragraph::new("Quantidade").styled(style_bold))
            .push()
            .map_err(render_error)?;

        for item in &detalhe.itens {
            table
                .row()
                .element(elements::Paragraph::new(item.nome.clone()))
                .element(elements::Paragraph::new(item.unidade.clone()))
                .element(elements::Paragraph::new(item.quantidade.normalize().to_string()))
                .push()
                .map_err(render_error)?;
        }

        doc.push(table);
        doc.push(elements::Break::new(2));

        // --- QR CODE PARA A VERSÃO ONLINE ---
        let url = cotacao_url(&self.public_base_url, header.id);
        doc.push(elements::Paragraph::new("Acompanhe online").styled(style::Style::new().bold().with_font_size(12)));
        doc.push(elements::Paragraph::new(url.clone()).styled(style::Style::new().with_font_size(8)));
        doc.push(elements::Break::new(1));

        let code = QrCode::new(url.as_bytes()).map_err(render_error)?;
        let image_buffer = code.render::<Luma<u8>>().build();
        let dynamic_image = image::DynamicImage::ImageLuma8(image_buffer);

        let pdf_image = elements::Image::from_dynamic_image(dynamic_image)
            .map_err(render_error)?
            .with_scale(genpdf::Scale::new(0.5, 0.5));
        doc.push(pdf_image);

        // 3. Renderiza para Buffer (Memória)
        let mut buffer = Vec::new();
        doc.render(&mut buffer).map_err(render_error)?;

        tracing::debug!("PDF da cotação {} gerado ({} bytes)", header.id, buffer.len());
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn public_url_has_no_double_slash() {
        let id = Uuid::nil();
        assert_eq!(
            cotacao_url("https://cotacoes.exemplo.com.br/", id),
            format!("https://cotacoes.exemplo.com.br/cotacoes/{}", id)
        );
    }

    #[test]
    fn missing_font_is_reported() {
        let service = DocumentService::new("./nao-existe".into(), "http://localhost:3000".into());
        let detalhe = CotacaoDetalhe {
            header: crate::models::cotacao::Cotacao {
                id: Uuid::new_v4(),
                obra_id: Uuid::new_v4(),
                cliente_id: Uuid::new_v4(),
                status: CotacaoStatus::Aberta,
                observacoes: None,
                created_at: chrono::Utc::now(),
                updated_at: chrono::Utc::now(),
            },
            obra_nome: "Residencial Ipê".into(),
            itens: vec![],
        };

        assert!(matches!(service.generate_cotacao_pdf(&detalhe), Err(AppError::FontNotFound(_))));
    }
}
