#[cfg(test)]
mod drivers_tests {
    use approx::assert_relative_eq;

    use crate::drivers::*;
    use crate::errors::ProjectionError;
    use crate::models::{Sector, VehicleEfficiencyRecord};
    use crate::tests::test_helpers::test_helpers::*;

    #[test]
    fn test_linear_regression_with_hdi_and_population() {
        let coefficients = RegressionCoefficients {
            regression_type: RegressionType::Linear,
            a0: 1.0,
            a1: 0.0,
            t0: 2020.0,
        };
        assert_relative_eq!(coefficients.evaluate(2020, 0.8 * 1.0e6), 800_000.0);
    }

    #[test]
    fn test_exponential_regression() {
        let coefficients = RegressionCoefficients {
            regression_type: RegressionType::Exponential,
            a0: 0.0,
            a1: 0.1,
            t0: 2020.0,
        };
        assert_relative_eq!(coefficients.evaluate(2030, 2.0), 2.0 * 1.0f64.exp(), max_relative = 1e-12);
    }

    #[test]
    fn test_unknown_regression_type() {
        let result = RegressionType::parse("quadratic", "energy_intensity");
        assert!(matches!(
            result,
            Err(ProjectionError::UnknownRegressionType { ref regression_type, .. }) if regression_type == "quadratic"
        ));

        let inputs = DriverInputs {
            energy_intensity: vec![regression(Sector::Commercial, "x", "poly", 1.0, 0.0, 2020.0)],
            ..synthetic_drivers()
        };
        let years = [2025];
        let projector = AnnualDriverProjector::new(&inputs, COUNTRY, &years);
        assert!(matches!(
            projector.project(false),
            Err(ProjectionError::UnknownRegressionType { .. })
        ));
    }

    #[test]
    fn test_ev_energy_in_terajoules() {
        let stock = EvStock::split(1000.0, 0.0);
        let wh = stock.annual_wh(15_000.0, 150.0, 0.0);

        assert_relative_eq!(wh, 2.25e9);
        assert_relative_eq!(wh / WH_PER_TJ, 8.1, max_relative = 1e-9);
        assert_relative_eq!(wh_to_mwh(wh), 2250.0, max_relative = 1e-9);
    }

    #[test]
    fn test_phev_split() {
        let stock = EvStock::split(1000.0, 0.25);
        assert_relative_eq!(stock.bev, 750.0);
        assert_relative_eq!(stock.phev, 250.0);
    }

    #[test]
    fn test_projection_by_sector_drivers() {
        let inputs = synthetic_drivers();
        let years = MODEL_YEARS;
        let rows = AnnualDriverProjector::new(&inputs, COUNTRY, &years)
            .project(false)
            .unwrap();

        assert_eq!(rows.len(), 4 * years.len());
        let residential_2025 = rows
            .iter()
            .find(|r| r.sector == Sector::Residential && r.model_year == 2025)
            .unwrap();
        // (0.001 + 0.0001 * 5) * 0.8 * 1e6 TJ
        assert_relative_eq!(
            residential_2025.annual_total,
            1200.0 * TJ_TO_MWH,
            max_relative = 1e-12
        );
        let commercial_2030 = rows
            .iter()
            .find(|r| r.sector == Sector::Commercial && r.model_year == 2030)
            .unwrap();
        assert_relative_eq!(commercial_2030.annual_total, 200.0 * TJ_TO_MWH, max_relative = 1e-12);
        assert_eq!(commercial_2030.subsector, "unspecified");
    }

    #[test]
    fn test_missing_driver_year_is_input_gap() {
        let mut inputs = synthetic_drivers();
        inputs.gdp.retain(|r| r.model_year != 2030);
        let years = MODEL_YEARS;

        let result = AnnualDriverProjector::new(&inputs, COUNTRY, &years).project(false);
        assert!(matches!(result, Err(ProjectionError::InputGap { ref table, .. }) if table == "gdp"));
    }

    #[test]
    fn test_long_layout_pivot() {
        let metric = |sector: Sector, metric: &str, value: f64| RegressionMetricRow {
            geography: COUNTRY.to_string(),
            sector: Some(sector),
            subsector: None,
            metric: metric.to_string(),
            value,
        };
        let rows = vec![
            metric(Sector::Residential, "res_a0_lin", 1.0),
            metric(Sector::Residential, "res_a1_lin", 0.5),
            metric(Sector::Residential, "res_t0_lin", 2020.0),
            metric(Sector::Commercial, "a0_exp", -2.0),
            metric(Sector::Commercial, "a1_exp", 0.01),
        ];
        let wide = pivot_regression_metrics(&rows, "energy_intensity").unwrap();

        assert_eq!(wide.len(), 2);
        let residential = wide.iter().find(|r| r.sector == Some(Sector::Residential)).unwrap();
        assert_eq!(residential.regression_type, "lin");
        assert_eq!((residential.a0, residential.a1, residential.t0), (1.0, 0.5, Some(2020.0)));
        let commercial = wide.iter().find(|r| r.sector == Some(Sector::Commercial)).unwrap();
        assert_eq!(commercial.t0, None);

        // t0 defaults to 0 when evaluated
        let table = RegressionTable::from_rows("energy_intensity", &wide).unwrap();
        let (_, coefficients) = table
            .iter()
            .find(|((_, s, _), _)| *s == Some(Sector::Commercial))
            .unwrap();
        assert_eq!(coefficients.t0, 0.0);
    }

    #[test]
    fn test_long_layout_missing_coefficient() {
        let rows = vec![RegressionMetricRow {
            geography: COUNTRY.to_string(),
            sector: Some(Sector::Industrial),
            subsector: Some("steel".to_string()),
            metric: "ind_a0_exp".to_string(),
            value: 1.0,
        }];
        let result = pivot_regression_metrics(&rows, "energy_intensity");
        assert!(matches!(result, Err(ProjectionError::InputGap { .. })));
    }

    fn vehicle_regression(regression_type: &str, a0: f64, a1: f64) -> RegressionRow {
        RegressionRow {
            geography: COUNTRY.to_string(),
            sector: None,
            subsector: None,
            regression_type: regression_type.to_string(),
            a0,
            a1,
            t0: Some(2020.0),
        }
    }

    fn ev_inputs() -> EvInputs {
        let mut electricity_per_vehicle_km = Vec::new();
        for year in MODEL_YEARS {
            for (subsector, wh) in [("bev", 150.0), ("phev", 100.0)] {
                electricity_per_vehicle_km.push(VehicleEfficiencyRecord {
                    geography: COUNTRY.to_string(),
                    subsector: subsector.to_string(),
                    model_year: year,
                    value: wh,
                });
            }
        }
        EvInputs {
            vehicle_per_capita: vec![vehicle_regression("lin", 0.5, 0.0)],
            km_per_vehicle_year: vec![vehicle_regression("lin", 15_000.0, 0.0)],
            ev_stock_share: constant_driver(0.1),
            phev_share: constant_driver(0.2),
            electricity_per_vehicle_km,
        }
    }

    #[test]
    fn test_ev_pathway_replaces_road_transport() {
        let mut inputs = synthetic_drivers();
        inputs
            .energy_intensity
            .push(regression(Sector::Transportation, "road", "lin", 0.0001, 0.0, 2020.0));
        inputs
            .energy_intensity
            .push(regression(Sector::Transportation, "rail", "lin", 0.00001, 0.0, 2020.0));
        inputs.ev = Some(ev_inputs());
        let years = MODEL_YEARS;

        let without = AnnualDriverProjector::new(&inputs, COUNTRY, &years)
            .project(false)
            .unwrap();
        let with = AnnualDriverProjector::new(&inputs, COUNTRY, &years)
            .project(true)
            .unwrap();
        assert_eq!(without.len(), with.len());

        let road: Vec<_> = with
            .iter()
            .filter(|r| r.sector == Sector::Transportation && r.subsector == "road")
            .collect();
        assert_eq!(road.len(), years.len());

        // 0.5 vehicles/capita * 1e6 people * 10% EV = 50 000 EVs; 40 000 BEV, 10 000 PHEV
        let wh = 40_000.0 * 15_000.0 * 150.0 + 10_000.0 * 15_000.0 * 100.0;
        for row in road {
            assert_relative_eq!(row.annual_total, wh_to_mwh(wh), max_relative = 1e-9);
        }

        let rail_with = with.iter().find(|r| r.subsector == "rail").unwrap();
        let rail_without = without.iter().find(|r| r.subsector == "rail").unwrap();
        assert_eq!(rail_with, rail_without);
    }

    #[test]
    fn test_ev_pathway_without_inputs_fails() {
        let inputs = synthetic_drivers();
        let years = MODEL_YEARS;
        let result = AnnualDriverProjector::new(&inputs, COUNTRY, &years).project(true);
        assert!(matches!(result, Err(ProjectionError::InputGap { .. })));
    }

    #[test]
    fn test_missing_phev_efficiency_is_input_gap() {
        let mut inputs = synthetic_drivers();
        let mut ev = ev_inputs();
        ev.electricity_per_vehicle_km.retain(|r| r.subsector != "phev");
        inputs.ev = Some(ev);
        let years = MODEL_YEARS;

        let result = AnnualDriverProjector::new(&inputs, COUNTRY, &years).project(true);
        assert!(matches!(
            result,
            Err(ProjectionError::InputGap { ref table, .. }) if table == "electricity_per_vehicle_km"
        ));
    }
}
