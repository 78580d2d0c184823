use super::{date_labels, Axis, CandleStyle, ChartError, Figure, Layout, Line, Trace};
use crate::cleaning;
use crate::market_data::{Field, PriceTable};

pub const INCREASING_COLOR: &str = "#26a69a";
pub const DECREASING_COLOR: &str = "#ef5350";

const REQUIRED: [Field; 5] = [Field::Date, Field::Open, Field::High, Field::Low, Field::Close];

pub fn candlestick_chart(table: &PriceTable) -> Result<Figure, ChartError> {
    let series = cleaning::prepare(table, &REQUIRED)?;

    let style = |color: &str| CandleStyle {
        line: Line {
            color: color.to_string(),
            width: 1.0,
        },
        fillcolor: color.to_string(),
    };

    let trace = Trace {
        kind: "candlestick",
        name: Some(table.ticker.to_string()),
        x: date_labels(&series.dates()),
        open: Some(series.values(Field::Open)),
        high: Some(series.values(Field::High)),
        low: Some(series.values(Field::Low)),
        close: Some(series.values(Field::Close)),
        increasing: Some(style(INCREASING_COLOR)),
        decreasing: Some(style(DECREASING_COLOR)),
        ..Default::default()
    };

    let mut layout = Layout::dark(
        format!("Candlestick Chart of {}", table.ticker),
        Axis::zoomable_dates("Date"),
        Axis::titled("Price"),
    );
    layout.showlegend = false;

    Ok(Figure {
        data: vec![trace],
        layout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{normalize, Cell, RawTable, Ticker};

    fn table(rows: Vec<Vec<Cell>>) -> PriceTable {
        let mut raw = RawTable::new(
            ["Date", "Open_MSFT", "High_MSFT", "Low_MSFT", "Close_MSFT"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        for row in rows {
            raw.push_row(row);
        }
        normalize(Ticker::parse("MSFT").unwrap(), raw)
    }

    fn row(date: &str, o: f64, h: f64, l: f64, c: Cell) -> Vec<Cell> {
        vec![
            Cell::Text(date.into()),
            Cell::Number(o),
            Cell::Number(h),
            Cell::Number(l),
            c,
        ]
    }

    #[test]
    fn test_single_ohlc_trace() {
        let figure = candlestick_chart(&table(vec![
            row("2020-01-02", 1.0, 2.0, 0.5, Cell::Number(1.5)),
            row("2020-01-03", 1.5, 2.5, 1.0, Cell::Text("x".into())),
            row("2020-01-06", 1.5, 2.5, 1.0, Cell::Number(1.2)),
        ]))
        .unwrap();

        assert_eq!(figure.data.len(), 1);
        let trace = &figure.data[0];
        assert_eq!(trace.kind, "candlestick");
        assert_eq!(trace.x, vec!["2020-01-02", "2020-01-06"]);
        assert_eq!(trace.close, Some(vec![1.5, 1.2]));
        assert_eq!(trace.increasing.as_ref().unwrap().line.color, INCREASING_COLOR);
        assert_eq!(trace.decreasing.as_ref().unwrap().line.color, DECREASING_COLOR);
        assert_eq!(figure.layout.title.text, "Candlestick Chart of MSFT");
        assert!(figure.layout.xaxis.rangeselector.is_some());
    }

    #[test]
    fn test_no_complete_rows() {
        let result = candlestick_chart(&table(vec![row("2020-01-02", 1.0, 2.0, 0.5, Cell::Missing)]));
        assert!(matches!(result, Err(ChartError::NoData(_))));
    }
}
