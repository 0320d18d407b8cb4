//! HTML extraction for the two page shapes the site serves: the paginated
//! food listing and the per-food detail page.
//!
//! Nothing here fails. Missing elements degrade to fallback text or empty
//! sequences, and the table layout is trusted positionally.

use scraper::{ElementRef, Html, Selector};

use crate::models::NutrientEntry;

pub const DESCRIPTION_FALLBACK: &str = "Descrição não encontrada";
pub const CLASS_FALLBACK: &str = "Não especificada";

const CODE_PARAM: &str = "codigo_alimento=";
const PAGE_PARAM: &str = "pagina=";

/// What a detail page yields before it is tagged with code and class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailPage {
    pub description: String,
    pub nutrients: Vec<NutrientEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub code: String,
    pub class: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    pub entries: Vec<ListingEntry>,
    pub has_next: bool,
}

#[must_use]
pub fn parse_detail(html: &str) -> DetailPage {
    extract_detail(&Html::parse_document(html))
}

#[must_use]
pub fn parse_listing(html: &str) -> ListingPage {
    extract_listing(&Html::parse_document(html))
}

/// Description from the first `h2`, `h1` or `title` (in that order of
/// preference), nutrients from the first table's body rows.
#[must_use]
pub fn extract_detail(document: &Html) -> DetailPage {
    let description = ["h2", "h1", "title"]
        .iter()
        .find_map(|css| first_element(document, css))
        .map_or_else(|| DESCRIPTION_FALLBACK.to_string(), |el| element_text(&el));

    DetailPage {
        description,
        nutrients: extract_nutrient_rows(document),
    }
}

fn extract_nutrient_rows(document: &Html) -> Vec<NutrientEntry> {
    let Some(table) = first_element(document, "table") else {
        return Vec::new();
    };
    let (Ok(row_sel), Ok(cell_sel)) = (Selector::parse("tr"), Selector::parse("td")) else {
        return Vec::new();
    };

    // First row is the header.
    table
        .select(&row_sel)
        .skip(1)
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&cell_sel).map(|c| element_text(&c)).collect();
            if cells.len() < 3 {
                return None;
            }
            Some(NutrientEntry {
                component: cells[0].clone(),
                unit: cells[1].clone(),
                value: cells[2].clone(),
            })
        })
        .collect()
}

/// Food codes linked from a listing page, plus whether a next-page link exists.
///
/// A row usually links the same food twice (code and name); each code is kept
/// once per page, in first-seen order.
#[must_use]
pub fn extract_listing(document: &Html) -> ListingPage {
    let Ok(anchor_sel) = Selector::parse("a[href]") else {
        return ListingPage::default();
    };

    let mut page = ListingPage::default();
    for anchor in document.select(&anchor_sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };

        if let Some(code) = code_from_href(href) {
            if page.entries.iter().any(|e| e.code == code) {
                continue;
            }
            page.entries.push(ListingEntry {
                code: code.to_string(),
                class: class_for_anchor(&anchor).unwrap_or_else(|| CLASS_FALLBACK.to_string()),
            });
        } else if href.contains(PAGE_PARAM) && is_next_label(&element_text(&anchor)) {
            page.has_next = true;
        }
    }
    page
}

fn code_from_href(href: &str) -> Option<&str> {
    let (_, rest) = href.split_once(CODE_PARAM)?;
    let code = rest.split('&').next().unwrap_or_default().trim();
    (!code.is_empty()).then_some(code)
}

/// Last cell of the anchor's enclosing table row, when the row has more than
/// one cell.
fn class_for_anchor(anchor: &ElementRef) -> Option<String> {
    let row = anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "tr")?;
    let cell_sel = Selector::parse("td").ok()?;
    let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
    if cells.len() < 2 {
        return None;
    }
    let class = element_text(cells.last()?);
    (!class.is_empty()).then_some(class)
}

fn is_next_label(text: &str) -> bool {
    let label = text.trim().to_lowercase();
    label.starts_with("próxima")
        || label.starts_with("proxima")
        || label.starts_with("next")
        || matches!(label.as_str(), "»" | ">" | "›" | ">>")
}

fn first_element<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(css).ok()?;
    document.select(&selector).next()
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}
