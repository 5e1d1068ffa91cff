use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

pub fn default_page() -> u32 {
    1
}

pub fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// Página 0 vira 1, limite 0 vira o padrão, limite acima do máximo é cortado.
pub fn normalize(page: u32, limit: u32) -> (u32, u32) {
    let page = page.max(1);
    let limit = match limit {
        0 => DEFAULT_PAGE_SIZE,
        l => l.min(MAX_PAGE_SIZE),
    };
    (page, limit)
}

pub fn offset(page: u32, limit: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(limit)
}

// Resposta paginada: o total acompanha a página para os controles do cliente.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: u32, limit: u32) -> Self {
        let total_pages = if limit == 0 {
            0
        } else {
            u32::try_from((total.max(0) as u64).div_ceil(u64::from(limit))).unwrap_or(u32::MAX)
        };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }

    /// Corta uma lista já filtrada e ordenada na página pedida.
    pub fn slice(all: Vec<T>, page: u32, limit: u32) -> Self {
        let total = all.len() as i64;
        let start = usize::try_from(offset(page, limit)).unwrap_or(usize::MAX);
        let items = all.into_iter().skip(start).take(limit as usize).collect();
        Self::new(items, total, page, limit)
    }
}
