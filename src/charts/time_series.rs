use super::{Axis, ChartError, Figure, Layout, Trace};
use crate::cleaning;
use crate::market_data::{Field, PriceTable};

pub const OPEN_COLOR: &str = "green";
pub const CLOSE_COLOR: &str = "blue";

const REQUIRED: [Field; 3] = [Field::Date, Field::Open, Field::Close];

/// Open and close prices as two lines over the full history.
pub fn time_series_chart(table: &PriceTable) -> Result<Figure, ChartError> {
    let series = cleaning::prepare(table, &REQUIRED)?;
    let dates = series.dates();

    let data = vec![
        Trace::scatter("Open Price", "lines", &dates, series.values(Field::Open))
            .with_line(OPEN_COLOR, 1.5),
        Trace::scatter("Close Price", "lines", &dates, series.values(Field::Close))
            .with_line(CLOSE_COLOR, 1.5),
    ];

    Ok(Figure {
        data,
        layout: Layout::dark(
            format!(
                "Time Series of {} Stock (Open and Close Prices)",
                table.ticker
            ),
            Axis::zoomable_dates("Date"),
            Axis::titled("Price"),
        ),
    })
}
