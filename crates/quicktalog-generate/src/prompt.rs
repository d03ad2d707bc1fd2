//! Prompt construction for the three pipeline stages.
//!
//! Pure string building only. Form metadata is interpolated as-is;
//! validation happens at the HTTP boundary before the pipeline runs.

use quicktalog_core::{FormMeta, GenerationSource};

/// Business context block shared by the detection and structuring prompts.
fn context_block(meta: &FormMeta) -> String {
    format!(
        "Business name: {}\nCatalogue title: {}\nCurrency: {}\nTheme: {}\nSubtitle: {}",
        meta.name, meta.title, meta.currency, meta.theme, meta.subtitle
    )
}

/// Stage 1 — split the source text into category-sized chunks.
pub fn detect_categories(source_text: &str, meta: &FormMeta) -> String {
    format!(
        "You are splitting the raw text of a service or product catalogue into \
         category-sized chunks.\n\n\
         {context}\n\n\
         Split the text below into one chunk per logical category (for example a menu \
         section, a service tier, or a product family). Every chunk must contain the \
         original text verbatim, with no paraphrasing, no summarising, and nothing \
         dropped. Respond with JSON only, no commentary, in exactly this shape:\n\
         {{\"chunks\": [\"<text of first category>\", \"<text of second category>\"]}}\n\n\
         Text:\n{source_text}",
        context = context_block(meta),
        source_text = source_text,
    )
}

/// Stage 2 — structure one chunk into a single category object.
pub fn structure_category(chunk: &str, meta: &FormMeta, source: GenerationSource) -> String {
    let layout_rule = match source {
        // Scanned documents carry no usable imagery, so the text-only layout is pinned.
        GenerationSource::Ocr => {
            "Set \"layout\" to exactly \"variant_3\".".to_string()
        }
        GenerationSource::Prompt => {
            "Choose \"layout\" from \"variant_1\", \"variant_2\", \"variant_3\" or \
             \"variant_4\", picking whichever presentation suits the category best \
             (\"variant_3\" is text-only, the others show item images)."
                .to_string()
        }
    };

    format!(
        "You are converting one category of a service or product catalogue into \
         structured JSON.\n\n\
         {context}\n\n\
         From the category text below, emit exactly one JSON object in this shape:\n\
         {{\"name\": \"<category name>\", \"layout\": \"variant_1\", \"items\": \
         [{{\"name\": \"<item name>\", \"description\": \"<short description>\", \
         \"price\": 0, \"image\": \"\"}}]}}\n\n\
         Rules:\n\
         - {layout_rule}\n\
         - \"price\" is a plain number in {currency}, never a string; use 0 when no \
         price is given.\n\
         - \"image\" is always the empty string.\n\
         - Include every item present in the text; invent nothing.\n\
         - Respond with the JSON object only, no commentary.\n\n\
         Category text:\n{chunk}",
        context = context_block(meta),
        layout_rule = layout_rule,
        currency = meta.currency,
        chunk = chunk,
    )
}

/// Stage 3 — reorder category names into a logical browsing sequence.
pub fn order_categories(names: &[String]) -> String {
    let listed = names
        .iter()
        .map(|n| format!("- {n}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Reorder the following catalogue categories into the sequence a customer \
         would naturally browse them (for food: starters before mains before desserts \
         before drinks; for services: foundational offerings before premium ones \
         before add-ons).\n\n\
         Categories:\n{listed}\n\n\
         Respond with a JSON array only, containing every name exactly once, spelled \
         exactly as given, and nothing else:\n\
         [\"<first category>\", \"<second category>\"]",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> FormMeta {
        FormMeta {
            name: "Cafe Aurora".into(),
            title: "Menu".into(),
            currency: "EUR".into(),
            theme: "light".into(),
            subtitle: "Breakfast all day".into(),
        }
    }

    #[test]
    fn detect_prompt_names_the_chunks_key() {
        let prompt = detect_categories("BREAKFAST\nEggs 5", &meta());
        assert!(prompt.contains("\"chunks\""));
        assert!(prompt.contains("verbatim"));
        assert!(prompt.contains("BREAKFAST\nEggs 5"));
        assert!(prompt.contains("Cafe Aurora"));
    }

    #[test]
    fn structure_prompt_embeds_schema_and_chunk() {
        let prompt = structure_category("LUNCH\nSoup 6", &meta(), GenerationSource::Prompt);
        assert!(prompt.contains("\"layout\""));
        assert!(prompt.contains("\"items\""));
        assert!(prompt.contains("LUNCH\nSoup 6"));
        assert!(prompt.contains("EUR"));
    }

    #[test]
    fn structure_prompt_never_requests_an_order_field() {
        let prompt = structure_category("LUNCH\nSoup 6", &meta(), GenerationSource::Prompt);
        assert!(!prompt.contains("\"order\""));
    }

    #[test]
    fn ocr_path_pins_the_text_only_layout() {
        let prompt = structure_category("LUNCH\nSoup 6", &meta(), GenerationSource::Ocr);
        assert!(prompt.contains("exactly \"variant_3\""));
    }

    #[test]
    fn prompt_path_offers_all_layouts() {
        let prompt = structure_category("LUNCH\nSoup 6", &meta(), GenerationSource::Prompt);
        assert!(prompt.contains("\"variant_1\""));
        assert!(prompt.contains("\"variant_4\""));
    }

    #[test]
    fn order_prompt_lists_every_name() {
        let names = vec!["Desserts".to_string(), "Starters".to_string()];
        let prompt = order_categories(&names);
        assert!(prompt.contains("- Desserts"));
        assert!(prompt.contains("- Starters"));
        assert!(prompt.contains("JSON array"));
    }
}
