use crate::domain::model::{JurisdictionTax, RateTable, TaxAmounts};

/// Tax owed to every jurisdiction in `rates` on `charge`, unrounded.
pub fn amounts(charge: f64, rates: &RateTable) -> TaxAmounts {
    let mut taxes = TaxAmounts::default();
    for rate in rates.iter() {
        taxes.insert(
            rate.name.clone(),
            JurisdictionTax {
                kind: rate.kind.clone(),
                amount: charge * rate.rate,
            },
        );
    }
    taxes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{JurisdictionKind, JurisdictionRate};

    fn table(entries: &[(&str, JurisdictionKind, f64)]) -> RateTable {
        entries
            .iter()
            .map(|(name, kind, rate)| JurisdictionRate {
                name: name.to_string(),
                kind: kind.clone(),
                rate: *rate,
            })
            .collect()
    }

    #[test]
    fn test_amount_is_charge_times_rate() {
        let rates = table(&[
            ("TEXAS STATE", JurisdictionKind::State, 0.0625),
            ("TRAVIS COUNTY", JurisdictionKind::County, 0.005),
            ("AUSTIN", JurisdictionKind::City, 0.02),
            ("AUSTIN MTA", JurisdictionKind::Other("SPD".into()), 0.01),
        ]);

        for charge in [0.0, 1.0, 100.0, 19.99, 12345.678] {
            let taxes = amounts(charge, &rates);
            assert_eq!(taxes.len(), rates.len());
            for rate in rates.iter() {
                let amount = taxes.get(&rate.name).unwrap();
                assert!((amount - charge * rate.rate).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_keeps_full_precision() {
        let rates = table(&[("CITY A", JurisdictionKind::City, 0.0125)]);
        let taxes = amounts(0.99, &rates);
        assert!((taxes.get("CITY A").unwrap() - 0.012375).abs() < 1e-12);
    }

    #[test]
    fn test_empty_rates_give_empty_amounts() {
        assert!(amounts(100.0, &RateTable::new()).is_empty());
    }

    #[test]
    fn test_kind_is_carried() {
        let rates = table(&[
            ("AUSTIN", JurisdictionKind::City, 0.01),
            ("ROUND ROCK", JurisdictionKind::City, 0.01),
        ]);
        let taxes = amounts(100.0, &rates);
        assert!((taxes.total_for_kind(&JurisdictionKind::City) - 2.0).abs() < 1e-9);
        assert_eq!(taxes.total_for_kind(&JurisdictionKind::State), 0.0);
    }
}
