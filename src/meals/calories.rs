//! Calorie totals derived from stored entities.

use crate::intakes::CalorieIntake;
use crate::meals::Meal;

/// Sum of the calories of every food in the meal; `0.0` for an empty meal.
pub fn compute_total_calories(meal: &Meal) -> f64 {
    meal.foods().iter().map(|f| f.calories()).sum()
}

/// Sum of the calories of the food logged by each intake event.
pub fn sum_intake_calories(intakes: &[CalorieIntake]) -> f64 {
    intakes.iter().map(|i| i.food().calories()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foods::repo_types::fixtures::food;
    use crate::users::repo_types::fixtures::user;

    #[test]
    fn empty_meal_totals_zero() {
        let meal = Meal::new("Snack", user("a@b.com"), vec![]).unwrap();
        assert_eq!(compute_total_calories(&meal), 0.0);
    }

    #[test]
    fn breakfast_totals_150() {
        let meal = Meal::new(
            "Breakfast",
            user("a@b.com"),
            vec![food("Egg", 100.0), food("Toast", 50.0)],
        )
        .unwrap();
        assert_eq!(compute_total_calories(&meal), 150.0);
        // idempotent
        assert_eq!(compute_total_calories(&meal), 150.0);
    }

    #[test]
    fn total_matches_sum_for_many_foods() {
        let foods: Vec<_> = (0..25).map(|i| food("Item", f64::from(i) * 1.5)).collect();
        let expected: f64 = foods.iter().map(|f| f.calories()).sum();
        let meal = Meal::new("Feast", user("a@b.com"), foods).unwrap();
        assert_eq!(compute_total_calories(&meal), expected);
    }
}
