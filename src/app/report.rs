use crate::core::multi_quote::MultiQuote;
use crate::utils::error::{QuoteError, Result};

const CSV_HEADER: [&str; 5] = ["scenario", "module", "category", "label", "amount"];

/// Category cell of the per-scenario summary row.
const TOTAL_ROW: &str = "TOTAL";

pub fn render_json(quotes: &MultiQuote) -> Result<String> {
    Ok(serde_json::to_string_pretty(quotes)?)
}

/// One `TOTAL` row per scenario carrying its final price, followed by its cost lines.
pub fn render_csv(quotes: &MultiQuote) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    for quote in &quotes.quotes {
        let final_price = format!("{:.2}", quote.final_price);
        writer.write_record([
            quote.scenario_id.as_str(),
            "",
            TOTAL_ROW,
            quote.label.as_str(),
            final_price.as_str(),
        ])?;

        for cost in quote.breakdown.computed.costs() {
            let amount = format!("{:.2}", cost.amount);
            writer.write_record([
                quote.scenario_id.as_str(),
                cost.module_id.as_str(),
                cost.category.as_str(),
                cost.label.as_str(),
                amount.as_str(),
            ])?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| QuoteError::IoError(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| QuoteError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::modules::testing::order;
    use crate::config::pricing::PricingConfig;
    use crate::core::multi_quote::MultiQuoteService;

    fn quotes() -> MultiQuote {
        MultiQuoteService::with_defaults(&PricingConfig::default())
            .unwrap()
            .quote_all(&order())
            .unwrap()
    }

    #[test]
    fn test_render_json() {
        let json = render_json(&quotes()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["baseCost"], 1002.8);
        assert_eq!(value["quotes"][1]["scenarioId"], "STANDARD");
        assert_eq!(value["quotes"][1]["breakdown"]["categoryTotals"]["LABOR"], 595.0);
        assert!(value["quotes"][0]["breakdown"]["computed"]["activatedModules"].is_array());
    }

    #[test]
    fn test_render_csv() {
        let csv = render_csv(&quotes()).unwrap();
        let mut reader = csv::Reader::from_reader(csv.as_bytes());

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        let totals: Vec<&csv::StringRecord> = rows.iter().filter(|r| &r[2] == TOTAL_ROW).collect();
        assert_eq!(totals.len(), 5);
        assert_eq!(&totals[1][0], "STANDARD");
        assert_eq!(&totals[1][4], "1002.80");

        assert!(rows
            .iter()
            .any(|r| &r[0] == "STANDARD" && &r[1] == "base-labor" && &r[4] == "595.00"));
    }
}
