#[cfg(test)]
mod smoothing_tests {
    use approx::assert_abs_diff_eq;

    use crate::config::ModelParameters;
    use crate::tests::test_helpers::test_helpers::*;
    use crate::models::DegreeDayGroup;
    use crate::weather::degree_days::{aggregate_degree_days, calculate_degree_days};
    use crate::weather::smoothing::*;

    fn adjusted_hdd(rows: &[crate::models::SmoothedDegreeDay]) -> Vec<Option<f64>> {
        rows.iter().map(|r| r.adjusted_hdd).collect()
    }

    #[test]
    fn test_minimum_fill_raises_zero_days() {
        let days = degree_day_group(
            &[Some(0.0), Some(2.0), Some(4.0), Some(0.0)],
            &[Some(0.0); 4],
        );
        let smoother = Smoother::new(true, SmoothingStrategy::MinimumFill, 5.0);
        let rows = smoother.smooth(&days);

        assert_eq!(adjusted_hdd(&rows), vec![Some(0.4), Some(2.0), Some(4.0), Some(0.4)]);
        assert_abs_diff_eq!(rows[0].adjusted_total_hdd.unwrap(), 6.8, epsilon = 1e-12);
        assert_eq!(rows[0].total_hdd, Some(6.0));
        // cdd group total is zero, nothing to distribute
        assert!(rows.iter().all(|r| r.adjusted_cdd == Some(0.0)));
        assert_eq!(rows[0].adjusted_total_cdd, Some(0.0));
    }

    #[test]
    fn test_threshold_floor_raises_small_days() {
        let days = degree_day_group(
            &[Some(0.0), Some(0.5), Some(10.0), Some(3.0)],
            &[Some(0.0); 4],
        );
        let smoother = Smoother::new(true, SmoothingStrategy::ThresholdFloor, 10.0);
        let rows = smoother.smooth(&days);

        assert_eq!(adjusted_hdd(&rows), vec![Some(1.0), Some(1.0), Some(10.0), Some(3.0)]);
        assert_abs_diff_eq!(rows[0].adjusted_total_hdd.unwrap(), 15.0, epsilon = 1e-12);
    }

    #[test]
    fn test_disabled_is_identity_for_both_strategies() {
        let params = ModelParameters::default();
        let days = calculate_degree_days(&synthetic_weather(COUNTRY, WEATHER_YEAR), &params);

        for strategy in [SmoothingStrategy::MinimumFill, SmoothingStrategy::ThresholdFloor] {
            let rows = Smoother::new(false, strategy, strategy.default_factor()).smooth(&days);
            for row in &rows {
                assert_eq!(row.adjusted_hdd, row.hdd);
                assert_eq!(row.adjusted_cdd, row.cdd);
                assert_eq!(row.adjusted_total_hdd, row.total_hdd);
                assert_eq!(row.adjusted_total_cdd, row.total_cdd);
            }
        }
    }

    #[test]
    fn test_enabled_never_lowers_values() {
        let params = ModelParameters::default();
        let days = calculate_degree_days(&synthetic_weather(COUNTRY, WEATHER_YEAR), &params);

        for strategy in [SmoothingStrategy::MinimumFill, SmoothingStrategy::ThresholdFloor] {
            let rows = Smoother::new(true, strategy, strategy.default_factor()).smooth(&days);
            assert_eq!(rows.len(), days.len());
            for row in &rows {
                assert!(row.adjusted_hdd.unwrap() >= row.hdd.unwrap());
                assert!(row.adjusted_cdd.unwrap() >= row.cdd.unwrap());
                if row.hdd.unwrap() > 0.0 && strategy == SmoothingStrategy::MinimumFill {
                    assert_eq!(row.adjusted_hdd, row.hdd);
                }
            }
        }
    }

    #[test]
    fn test_all_zero_group_unchanged() {
        let days = degree_day_group(&[Some(0.0); 3], &[Some(0.0); 3]);
        let rows = Smoother::new(true, SmoothingStrategy::MinimumFill, 5.0).smooth(&days);

        assert!(rows.iter().all(|r| r.adjusted_hdd == Some(0.0)));
        assert_eq!(rows[0].num_days, 3);
    }

    #[test]
    fn test_null_group_left_unchanged() {
        let days = degree_day_group(&[Some(0.0), None, Some(3.0)], &[Some(0.0); 3]);
        let rows = Smoother::new(true, SmoothingStrategy::MinimumFill, 5.0).smooth(&days);

        assert_eq!(adjusted_hdd(&rows), vec![Some(0.0), None, Some(3.0)]);
        assert_eq!(rows[0].adjusted_total_hdd, None);
    }

    #[test]
    fn test_strategy_defaults_and_parsing() {
        assert_eq!(SmoothingStrategy::MinimumFill.default_factor(), 5.0);
        assert_eq!(SmoothingStrategy::ThresholdFloor.default_factor(), 10.0);
        assert_eq!(
            "threshold_floor".parse::<SmoothingStrategy>().unwrap(),
            SmoothingStrategy::ThresholdFloor
        );
        assert!("spline".parse::<SmoothingStrategy>().is_err());

        let params = ModelParameters {
            shoulder_month_smoothing_strategy: SmoothingStrategy::ThresholdFloor,
            ..ModelParameters::default()
        };
        assert_eq!(params.smoothing_factor(), 10.0);
    }

    #[test]
    fn test_group_table_sets_day_count_and_totals() {
        let days = degree_day_group(
            &[Some(0.0), Some(2.0), Some(4.0), Some(0.0)],
            &[Some(0.0); 4],
        );
        let groups: Vec<DegreeDayGroup> = aggregate_degree_days(&days)
            .into_iter()
            .map(|g| DegreeDayGroup {
                num_days: 10,
                total_hdd: Some(20.0),
                ..g
            })
            .collect();
        let smoother = Smoother::new(true, SmoothingStrategy::MinimumFill, 5.0);
        let rows = smoother.smooth_grouped(&days, &groups);

        assert_eq!(adjusted_hdd(&rows), vec![Some(0.4), Some(2.0), Some(4.0), Some(0.4)]);
        assert!(rows.iter().all(|r| r.num_days == 10));
        assert_eq!(rows[0].total_hdd, Some(20.0));
        assert_abs_diff_eq!(rows[0].adjusted_total_hdd.unwrap(), 20.8, epsilon = 1e-12);
        assert_eq!(rows[0].adjusted_total_cdd, Some(0.0));
    }

    #[test]
    fn test_computed_groups_match_plain_smoothing() {
        let params = ModelParameters::default();
        let days = calculate_degree_days(&synthetic_weather(COUNTRY, WEATHER_YEAR), &params);
        let smoother = Smoother::from_params(&params);

        assert_eq!(
            smoother.smooth_grouped(&days, &aggregate_degree_days(&days)),
            smoother.smooth(&days)
        );
    }
}
