use serde::Serialize;

use crate::application::chapters::{ChapterPage, FailedChapter, IngestReport};
use crate::domain::chapters::ChapterRecord;

#[derive(Debug, Serialize)]
pub struct ChapterListResponse {
    pub success: bool,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub chapters: Vec<ChapterRecord>,
}

impl From<ChapterPage> for ChapterListResponse {
    fn from(page: ChapterPage) -> Self {
        Self {
            success: true,
            total: page.total,
            page: page.page,
            limit: page.limit,
            chapters: page.chapters,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChapterResponse {
    pub success: bool,
    pub chapter: ChapterRecord,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub success_count: usize,
    pub failed_count: usize,
    pub failed_chapters: Vec<FailedChapter>,
}

impl From<IngestReport> for UploadResponse {
    fn from(report: IngestReport) -> Self {
        Self {
            success: true,
            message: format!("Successfully processed {} chapters", report.attempted),
            success_count: report.success_count,
            failed_count: report.failed.len(),
            failed_chapters: report.failed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ServiceEndpoints {
    pub chapters: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ServiceBanner {
    pub message: &'static str,
    pub version: &'static str,
    pub endpoints: ServiceEndpoints,
}
