//! Region Filter Module
//! Selects the rows of one parent region (state) from a county table.

use crate::data::loader::{CountyTable, REGION_COLUMN};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use tracing::info;

/// Pure row selection on the parent-region column.
pub struct RegionFilter;

impl RegionFilter {
    /// Rows whose region equals `region` exactly, in source order.
    ///
    /// Zero matching rows is an error rather than an empty table.
    pub fn select(table: &CountyTable, region: &str) -> Result<CountyTable> {
        let filtered = table
            .dataframe()
            .clone()
            .lazy()
            .filter(col(REGION_COLUMN).eq(lit(region)))
            .collect()?;

        if filtered.height() == 0 {
            return Err(PipelineError::RegionNotFound {
                region: region.to_string(),
                source_name: table.source_name().to_string(),
            });
        }

        info!(
            region,
            source = table.source_name(),
            rows = filtered.height(),
            "selected region rows"
        );

        Ok(table.with_dataframe(filtered))
    }

    /// Distinct region names present in the table, sorted.
    pub fn regions(table: &CountyTable) -> Result<Vec<String>> {
        let unique = table.dataframe().column(REGION_COLUMN)?.str()?.unique()?;
        let mut regions: Vec<String> = unique.into_iter().flatten().map(str::to_string).collect();
        regions.sort();
        Ok(regions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DataLoader, TableKind};

    const CASES: &str = "\
Admin2,Province_State,1/22/20,1/23/20
Anderson,Texas,0,1
Autauga,Alabama,0,0
Andrews,Texas,1,1
Baldwin,Alabama,2,4
Bexar,Texas,5,9
";

    fn table() -> CountyTable {
        DataLoader::load_reader(CASES.as_bytes(), "cases", TableKind::Cases).unwrap()
    }

    #[test]
    fn test_select_keeps_matching_rows_in_order() {
        let texas = RegionFilter::select(&table(), "Texas").unwrap();
        assert_eq!(texas.get_row_count(), 3);

        let counties: Vec<&str> = texas
            .dataframe()
            .column("Admin2")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        assert_eq!(counties, vec!["Anderson", "Andrews", "Bexar"]);
        assert_eq!(texas.first_date_index(), 2);
    }

    #[test]
    fn test_select_is_exact_match() {
        let err = RegionFilter::select(&table(), "texas").unwrap_err();
        assert!(matches!(err, PipelineError::RegionNotFound { region, .. } if region == "texas"));
    }

    #[test]
    fn test_select_absent_region() {
        let err = RegionFilter::select(&table(), "Atlantis").unwrap_err();
        assert!(matches!(err, PipelineError::RegionNotFound { .. }));
    }

    #[test]
    fn test_regions_sorted_unique() {
        assert_eq!(
            RegionFilter::regions(&table()).unwrap(),
            vec!["Alabama", "Texas"]
        );
    }

    #[test]
    fn test_regions_keep_quoted_names() {
        let input = "Province_State,1/22/20\n\"Prince \"\"George\"\"\",1\nOhio,2\n";
        let table = DataLoader::load_reader(input.as_bytes(), "quoted", TableKind::Cases).unwrap();
        assert_eq!(
            RegionFilter::regions(&table).unwrap(),
            vec!["Ohio", "Prince \"George\""]
        );
    }
}
