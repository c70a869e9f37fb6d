#[cfg(test)]
mod degree_days_tests {
    use approx::assert_abs_diff_eq;

    use crate::config::ModelParameters;
    use crate::models::{DailyWeatherRecord, DayType};
    use crate::tests::test_helpers::test_helpers::*;
    use crate::weather::degree_days::*;

    fn record(day: chrono::NaiveDate, t: Option<f64>) -> DailyWeatherRecord {
        DailyWeatherRecord {
            geography: COUNTRY.to_string(),
            date: day,
            composite_temperature: t,
        }
    }

    #[test]
    fn test_ten_degrees_gives_eight_hdd() {
        let params = ModelParameters::default();
        let rows = calculate_degree_days(&[record(date(2018, 1, 3), Some(10.0))], &params);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].hdd, Some(8.0));
        assert_eq!(rows[0].cdd, Some(0.0));
        assert_eq!(rows[0].month, 1);
        assert_eq!(rows[0].day, 3);
        assert_eq!(rows[0].weather_year, 2018);
    }

    #[test]
    fn test_degree_days_non_negative_and_exclusive() {
        let params = ModelParameters::default();
        let weather = synthetic_weather(COUNTRY, WEATHER_YEAR);
        let rows = calculate_degree_days(&weather, &params);

        assert_eq!(rows.len(), 365);
        for row in &rows {
            let hdd = row.hdd.unwrap();
            let cdd = row.cdd.unwrap();
            assert!(hdd >= 0.0);
            assert!(cdd >= 0.0);
            assert_eq!(hdd.min(cdd), 0.0);
        }
    }

    #[test]
    fn test_thresholds_are_independent() {
        let params = ModelParameters {
            heating_threshold: 15.0,
            cooling_threshold: 22.0,
            ..ModelParameters::default()
        };
        let rows = calculate_degree_days(
            &[
                record(date(2018, 6, 1), Some(18.0)),
                record(date(2018, 6, 2), Some(25.5)),
                record(date(2018, 6, 3), Some(12.0)),
            ],
            &params,
        );

        assert_eq!((rows[0].hdd, rows[0].cdd), (Some(0.0), Some(0.0)));
        assert_abs_diff_eq!(rows[1].cdd.unwrap(), 3.5, epsilon = 1e-12);
        assert_abs_diff_eq!(rows[2].hdd.unwrap(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_null_temperature_propagates() {
        let params = ModelParameters::default();
        let rows = calculate_degree_days(&[record(date(2018, 2, 1), None)], &params);

        assert_eq!(rows[0].hdd, None);
        assert_eq!(rows[0].cdd, None);
    }

    #[test]
    fn test_weekend_classification() {
        let params = ModelParameters::default();
        // 2018-01-06 is a Saturday, 2018-01-08 a Monday
        let rows = calculate_degree_days(
            &[
                record(date(2018, 1, 8), Some(5.0)),
                record(date(2018, 1, 6), Some(5.0)),
            ],
            &params,
        );

        assert_eq!(rows[0].date, date(2018, 1, 6));
        assert_eq!(rows[0].day_type, DayType::Weekend);
        assert_eq!(rows[1].day_type, DayType::Weekday);
    }

    #[test]
    fn test_aggregation_counts_and_sums() {
        let params = ModelParameters::default();
        let weather = synthetic_weather(COUNTRY, WEATHER_YEAR);
        let degree_days = calculate_degree_days(&weather, &params);
        let groups = aggregate_degree_days(&degree_days);

        assert_eq!(groups.len(), 24);
        assert_eq!(groups.iter().map(|g| g.num_days).sum::<u32>(), 365);

        let january_weekend = groups
            .iter()
            .find(|g| g.month == 1 && g.day_type == DayType::Weekend)
            .unwrap();
        // 2018-01: 6,7,13,14,20,21,27,28
        assert_eq!(january_weekend.num_days, 8);
        let expected: f64 = degree_days
            .iter()
            .filter(|d| d.month == 1 && d.day_type == DayType::Weekend)
            .map(|d| d.hdd.unwrap())
            .sum();
        assert_abs_diff_eq!(january_weekend.total_hdd.unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_group_total_null_when_member_null() {
        let rows = degree_day_group(&[Some(2.0), None, Some(1.0)], &[Some(0.0), None, Some(0.0)]);
        let groups = aggregate_degree_days(&rows);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].num_days, 3);
        assert_eq!(groups[0].total_hdd, None);
        assert_eq!(groups[0].total_cdd, None);
    }

    #[test]
    fn test_single_member_group() {
        let rows = degree_day_group(&[Some(4.0)], &[Some(0.0)]);
        let groups = aggregate_degree_days(&rows);

        assert_eq!(groups[0].num_days, 1);
        assert_eq!(groups[0].total_hdd, Some(4.0));
    }
}
