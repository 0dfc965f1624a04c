//! MCP server exposing the `convert_html_to_pdf` tool over stdio

use crate::{format_kilobytes, format_millis, ConversionRequest, ConversionResult, PdfConverter};
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*, tool,
    tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

pub const TOOL_NAME: &str = "convert_html_to_pdf";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessPayload {
    pub success: bool,
    pub message: String,
    pub output_path: String,
    pub processing_time: String,
    pub file_size: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailurePayload {
    pub success: bool,
    pub error: String,
    pub processing_time: String,
}

/// JSON body returned to the tool caller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolPayload {
    Success(SuccessPayload),
    Failure(FailurePayload),
}

impl ToolPayload {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolPayload::Failure(_))
    }
}

impl From<&ConversionResult> for ToolPayload {
    fn from(result: &ConversionResult) -> Self {
        match result {
            ConversionResult::Success {
                output_path,
                processing_time,
                file_size,
            } => ToolPayload::Success(SuccessPayload {
                success: true,
                message: "PDF generated successfully".to_string(),
                output_path: output_path.display().to_string(),
                processing_time: format_millis(*processing_time),
                file_size: file_size
                    .map(format_kilobytes)
                    .unwrap_or_else(|| "unknown".to_string()),
            }),
            ConversionResult::Failure {
                error,
                processing_time,
            } => ToolPayload::Failure(FailurePayload {
                success: false,
                error: error.to_string(),
                processing_time: format_millis(*processing_time),
            }),
        }
    }
}

/// Tool response for a finished conversion; failures are flagged as errors.
pub fn tool_response(result: &ConversionResult) -> CallToolResult {
    let payload = ToolPayload::from(result);
    let text = serde_json::to_string_pretty(&payload).unwrap_or_default();

    if payload.is_error() {
        CallToolResult::error(vec![Content::text(text)])
    } else {
        CallToolResult::success(vec![Content::text(text)])
    }
}

#[derive(Clone)]
pub struct Html2PdfServer {
    converter: Arc<PdfConverter>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl Html2PdfServer {
    pub fn new(converter: Arc<PdfConverter>) -> Self {
        Self {
            converter,
            tool_router: Self::tool_router(),
        }
    }

    /// Convert HTML file or HTML content to PDF
    #[tool(
        description = "Convert HTML file or HTML content to PDF with browser rendering. Supports CSS, JavaScript, and external resources."
    )]
    async fn convert_html_to_pdf(
        &self,
        Parameters(request): Parameters<ConversionRequest>,
    ) -> Result<CallToolResult, McpError> {
        let result = self.converter.convert(&request).await;
        Ok(tool_response(&result))
    }
}

#[tool_handler]
impl ServerHandler for Html2PdfServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Renders HTML files or inline markup to PDF with headless Chrome. \
                 Set waitForNetworkIdle when the page loads charts or other content late."
                    .into(),
            ),
        }
    }
}

/// Serve the tool on stdin/stdout until the client disconnects.
pub async fn run_server(converter: Arc<PdfConverter>) -> Result<(), Box<dyn std::error::Error>> {
    let service = Html2PdfServer::new(converter)
        .serve(rmcp::transport::io::stdio())
        .await?;

    info!("HTML to PDF MCP server running on stdio");
    service.waiting().await?;

    Ok(())
}
