use std::io::{self, BufRead, Write};

use anyhow::Context;
use tracing::{error, info};

use crate::console::prompt::Prompter;
use crate::error::ServiceError;
use crate::foods::{Food, Nutrition};
use crate::meals::Meal;
use crate::state::AppState;
use crate::users::{NewUser, Role, User};
use crate::validation::{
    normalize_email, validate_age, validate_macro, validate_name, validate_non_negative,
    validate_non_negative_int, validate_password, validate_phone, ValidationError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    SignIn,
    Main,
    Meals,
    Foods,
    Exit,
}

impl Screen {
    /// Top-level menu: 1 meals, 2 foods, anything else exits.
    pub fn after_main_choice(choice: u32) -> Self {
        match choice {
            1 => Screen::Meals,
            2 => Screen::Foods,
            _ => Screen::Exit,
        }
    }
}

/// Entries shared by the meal and food submenus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    Add,
    Update,
    Delete,
    ViewAll,
    DeleteAll,
    Back,
}

impl MenuAction {
    pub fn from_choice(choice: u32) -> Option<Self> {
        match choice {
            1 => Some(Self::Add),
            2 => Some(Self::Update),
            3 => Some(Self::Delete),
            4 => Some(Self::ViewAll),
            5 => Some(Self::DeleteAll),
            6 => Some(Self::Back),
            _ => None,
        }
    }
}

fn describe_meal(meal: &Meal) -> String {
    let foods: Vec<&str> = meal.foods().iter().map(Food::name).collect();
    format!(
        "{} - {:.0} kcal [{}]",
        meal.name(),
        meal.total_calories(),
        foods.join(", ")
    )
}

fn describe_food(food: &Food) -> String {
    let n = food.nutrition();
    format!(
        "{} - {:.0} kcal (P {:.1} g, F {:.1} g, C {:.1} g)",
        food.name(),
        food.calories(),
        n.protein(),
        n.fat(),
        n.carbohydrates()
    )
}

fn required(field: &'static str) -> impl Fn(&str) -> Result<String, ValidationError> {
    move |s| validate_name(field, s).map(|()| s.trim().to_string())
}

struct FoodFields {
    name: String,
    details: String,
    nutrition: Nutrition,
    calories: f64,
}

/// Operator session: sign in, then the meal and food menus.
pub struct Console<R, W> {
    state: AppState,
    io: Prompter<R, W>,
    user: Option<User>,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(state: AppState, io: Prompter<R, W>) -> Self {
        Self {
            state,
            io,
            user: None,
        }
    }

    pub fn prompter(&self) -> &Prompter<R, W> {
        &self.io
    }

    pub fn signed_in(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Runs until the operator exits or input ends.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut screen = Screen::SignIn;
        while screen != Screen::Exit {
            let next = match screen {
                Screen::SignIn => self.sign_in().await,
                Screen::Main => self.main_menu(),
                Screen::Meals => self.meal_menu().await,
                Screen::Foods => self.food_menu().await,
                Screen::Exit => Ok(Screen::Exit),
            };
            screen = match next {
                Ok(s) => s,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Screen::Exit,
                Err(e) => return Err(e).context("console i/o"),
            };
        }
        self.io.say("Goodbye.").context("console i/o")?;
        Ok(())
    }

    fn report(&mut self, e: ServiceError) -> io::Result<()> {
        if !e.is_recoverable() {
            error!(error = %e, "console operation failed");
        }
        self.io.say(format_args!("Error: {e}"))
    }

    async fn sign_in(&mut self) -> io::Result<Screen> {
        self.io.say("1. Log in")?;
        self.io.say("2. Register")?;
        self.io.say("3. Exit")?;
        match self.io.read_choice(3)? {
            1 => self.log_in().await,
            2 => self.register().await,
            _ => Ok(Screen::Exit),
        }
    }

    async fn log_in(&mut self) -> io::Result<Screen> {
        let email = self.io.read_line("Email")?;
        let password = self.io.read_line("Password")?;
        match self.state.users.login(&email, &password).await {
            Ok(user) => {
                if let Some(id) = user.id() {
                    if let Err(e) = self.state.users.record_login(id).await {
                        self.report(e)?;
                    }
                }
                self.io.say(format_args!("Welcome, {}.", user.name()))?;
                self.user = Some(user);
                Ok(Screen::Main)
            }
            Err(e) => {
                self.report(e)?;
                Ok(Screen::SignIn)
            }
        }
    }

    async fn register(&mut self) -> io::Result<Screen> {
        let input = NewUser {
            name: self.io.read_validated("Name", required("name"))?,
            password: self
                .io
                .read_validated("Password", |s| validate_password(s).map(|()| s.to_string()))?,
            age: self.io.read_number("Age", validate_age)?,
            weight: self
                .io
                .read_number("Weight (kg)", |v| validate_non_negative_int("weight", v))?,
            height: self
                .io
                .read_number("Height (m)", |v| validate_non_negative("height", v))?,
            calorie_goal: self.io.read_number("Daily calorie goal (kcal)", |v| {
                validate_non_negative_int("calorie_goal", v)
            })?,
            email: self.io.read_validated("Email", normalize_email)?,
            phone: self
                .io
                .read_validated("Phone", |s| validate_phone(s).map(|()| s.trim().to_string()))?,
            role: Role::Member,
        };
        match self.state.users.register(input).await {
            Ok(user) => {
                info!(user_id = ?user.id(), "registered from console");
                self.io.say(format_args!("Welcome, {}.", user.name()))?;
                self.user = Some(user);
                Ok(Screen::Main)
            }
            Err(e) => {
                self.report(e)?;
                Ok(Screen::SignIn)
            }
        }
    }

    fn main_menu(&mut self) -> io::Result<Screen> {
        self.io.say("1. Meal menu")?;
        self.io.say("2. Food menu")?;
        self.io.say("3. Exit")?;
        Ok(Screen::after_main_choice(self.io.read_choice(3)?))
    }

    fn submenu(&mut self, noun: &str) -> io::Result<MenuAction> {
        self.io.say(format_args!("1. Add {noun}"))?;
        self.io.say(format_args!("2. Update {noun}"))?;
        self.io.say(format_args!("3. Delete {noun}"))?;
        self.io.say(format_args!("4. View all {noun}s"))?;
        self.io.say(format_args!("5. Delete all {noun}s"))?;
        self.io.say("6. Back")?;
        Ok(MenuAction::from_choice(self.io.read_choice(6)?).unwrap_or(MenuAction::Back))
    }

    async fn meal_menu(&mut self) -> io::Result<Screen> {
        match self.submenu("meal")? {
            MenuAction::Add => self.add_meal().await?,
            MenuAction::Update => self.update_meal().await?,
            MenuAction::Delete => self.delete_meal().await?,
            MenuAction::ViewAll => self.list_meals().await?,
            MenuAction::DeleteAll => {
                if self.io.confirm("Delete every meal?")? {
                    match self.state.meals.delete_all().await {
                        Ok(()) => self.io.say("All meals deleted.")?,
                        Err(e) => self.report(e)?,
                    }
                }
            }
            MenuAction::Back => return Ok(Screen::Main),
        }
        Ok(Screen::Meals)
    }

    async fn food_menu(&mut self) -> io::Result<Screen> {
        match self.submenu("food")? {
            MenuAction::Add => self.add_food().await?,
            MenuAction::Update => self.update_food().await?,
            MenuAction::Delete => self.delete_food().await?,
            MenuAction::ViewAll => self.list_foods().await?,
            MenuAction::DeleteAll => {
                if self.io.confirm("Delete every food?")? {
                    match self.state.foods.delete_all().await {
                        Ok(()) => self.io.say("All foods deleted.")?,
                        Err(e) => self.report(e)?,
                    }
                }
            }
            MenuAction::Back => return Ok(Screen::Main),
        }
        Ok(Screen::Foods)
    }

    async fn all_meals(&mut self) -> io::Result<Option<Vec<Meal>>> {
        match self.state.meals.get_all().await {
            Ok(meals) => Ok(Some(meals)),
            Err(e) => {
                self.report(e)?;
                Ok(None)
            }
        }
    }

    async fn all_foods(&mut self) -> io::Result<Option<Vec<Food>>> {
        match self.state.foods.get_all().await {
            Ok(foods) => Ok(Some(foods)),
            Err(e) => {
                self.report(e)?;
                Ok(None)
            }
        }
    }

    async fn choose_foods(&mut self) -> io::Result<Option<Vec<Food>>> {
        let Some(foods) = self.all_foods().await? else {
            return Ok(None);
        };
        if foods.is_empty() {
            self.io.say("No foods yet; add some from the food menu.")?;
            return Ok(Some(Vec::new()));
        }
        let picked = self.io.pick_many(&foods, describe_food)?;
        Ok(Some(picked.into_iter().map(|i| foods[i].clone()).collect()))
    }

    async fn add_meal(&mut self) -> io::Result<()> {
        let Some(owner) = self.user.clone() else {
            return self.io.say("Please sign in first.");
        };
        let name = self.io.read_validated("Meal name", required("name"))?;
        let Some(foods) = self.choose_foods().await? else {
            return Ok(());
        };
        let meal = match Meal::new(&name, owner, foods) {
            Ok(m) => m,
            Err(e) => return self.report(e.into()),
        };
        match self.state.meals.create(meal).await {
            Ok(saved) => self
                .io
                .say(format_args!("Saved {}.", describe_meal(&saved))),
            Err(e) => self.report(e),
        }
    }

    async fn update_meal(&mut self) -> io::Result<()> {
        let Some(meals) = self.all_meals().await? else {
            return Ok(());
        };
        let Some(i) = self.io.pick(&meals, describe_meal)? else {
            return Ok(());
        };
        let mut meal = meals[i].clone();
        let name = self.io.read_validated("New name (blank to keep)", |s| {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                validate_name("name", s).map(|()| Some(s.to_string()))
            }
        })?;
        if let Some(name) = name {
            if let Err(e) = meal.set_name(&name) {
                return self.report(e.into());
            }
        }
        if self.io.confirm("Change foods?")? {
            let Some(foods) = self.choose_foods().await? else {
                return Ok(());
            };
            meal.set_foods(foods);
        }
        match self.state.meals.update(meal).await {
            Ok(saved) => self
                .io
                .say(format_args!("Updated {}.", describe_meal(&saved))),
            Err(e) => self.report(e),
        }
    }

    async fn delete_meal(&mut self) -> io::Result<()> {
        let Some(meals) = self.all_meals().await? else {
            return Ok(());
        };
        let Some(i) = self.io.pick(&meals, describe_meal)? else {
            return Ok(());
        };
        let Some(id) = meals[i].id() else {
            return Ok(());
        };
        match self.state.meals.delete_by_id(id).await {
            Ok(()) => self.io.say(format_args!("Deleted {}.", meals[i].name())),
            Err(e) => self.report(e),
        }
    }

    async fn list_meals(&mut self) -> io::Result<()> {
        let Some(meals) = self.all_meals().await? else {
            return Ok(());
        };
        if meals.is_empty() {
            return self.io.say("No meals.");
        }
        for meal in &meals {
            self.io.say(describe_meal(meal))?;
        }
        Ok(())
    }

    /// `None` when the fields were rejected; the reason has been printed.
    fn read_food_fields(&mut self) -> io::Result<Option<FoodFields>> {
        let name = self.io.read_validated("Food name", required("name"))?;
        let details = self.io.read_line("Details")?;
        let protein = self
            .io
            .read_number("Protein (g)", |v| validate_macro("protein", v))?;
        let fat = self.io.read_number("Fat (g)", |v| validate_macro("fat", v))?;
        let carbohydrates = self
            .io
            .read_number("Carbohydrates (g)", |v| validate_macro("carbohydrates", v))?;
        let calories = self
            .io
            .read_number("Calories (kcal)", |v| validate_non_negative("calories", v))?;
        let nutrition = match Nutrition::new(protein, fat, carbohydrates) {
            Ok(n) => n,
            Err(e) => {
                self.report(e.into())?;
                return Ok(None);
            }
        };
        Ok(Some(FoodFields {
            name,
            details,
            nutrition,
            calories,
        }))
    }

    async fn add_food(&mut self) -> io::Result<()> {
        let Some(fields) = self.read_food_fields()? else {
            return Ok(());
        };
        let food = match Food::new(
            &fields.name,
            &fields.details,
            fields.nutrition,
            fields.calories,
        ) {
            Ok(f) => f,
            Err(e) => return self.report(e.into()),
        };
        match self.state.foods.create(food).await {
            Ok(saved) => self
                .io
                .say(format_args!("Saved {}.", describe_food(&saved))),
            Err(e) => self.report(e),
        }
    }

    async fn update_food(&mut self) -> io::Result<()> {
        let Some(foods) = self.all_foods().await? else {
            return Ok(());
        };
        let Some(i) = self.io.pick(&foods, describe_food)? else {
            return Ok(());
        };
        let Some(fields) = self.read_food_fields()? else {
            return Ok(());
        };
        let mut food = foods[i].clone();
        if let Err(e) = food.set_name(&fields.name) {
            return self.report(e.into());
        }
        if let Err(e) = food.set_calories(fields.calories) {
            return self.report(e.into());
        }
        food.set_details(&fields.details);
        food.set_nutrition(fields.nutrition);
        match self.state.foods.update(food).await {
            Ok(saved) => self
                .io
                .say(format_args!("Updated {}.", describe_food(&saved))),
            Err(e) => self.report(e),
        }
    }

    async fn delete_food(&mut self) -> io::Result<()> {
        let Some(foods) = self.all_foods().await? else {
            return Ok(());
        };
        let Some(i) = self.io.pick(&foods, describe_food)? else {
            return Ok(());
        };
        let Some(id) = foods[i].id() else {
            return Ok(());
        };
        match self.state.foods.delete_by_id(id).await {
            Ok(()) => self.io.say(format_args!("Deleted {}.", foods[i].name())),
            Err(e) => self.report(e),
        }
    }

    async fn list_foods(&mut self) -> io::Result<()> {
        let Some(foods) = self.all_foods().await? else {
            return Ok(());
        };
        if foods.is_empty() {
            return self.io.say("No foods.");
        }
        for food in &foods {
            self.io.say(describe_food(food))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_choices_map_to_screens() {
        assert_eq!(Screen::after_main_choice(1), Screen::Meals);
        assert_eq!(Screen::after_main_choice(2), Screen::Foods);
        assert_eq!(Screen::after_main_choice(3), Screen::Exit);
    }

    #[test]
    fn submenu_choices_map_to_actions() {
        let actions: Vec<_> = (1..=6).filter_map(MenuAction::from_choice).collect();
        assert_eq!(
            actions,
            vec![
                MenuAction::Add,
                MenuAction::Update,
                MenuAction::Delete,
                MenuAction::ViewAll,
                MenuAction::DeleteAll,
                MenuAction::Back,
            ]
        );
        assert_eq!(MenuAction::from_choice(0), None);
        assert_eq!(MenuAction::from_choice(7), None);
    }

    #[test]
    fn meal_description_lists_foods_and_total() {
        use crate::foods::repo_types::fixtures::food;
        use crate::users::repo_types::fixtures::user;

        let mut meal = Meal::new(
            "Breakfast",
            user("john@example.com"),
            vec![food("Eggs", 100.0), food("Toast", 50.0)],
        )
        .unwrap();
        meal.refresh_total_calories();
        assert_eq!(describe_meal(&meal), "Breakfast - 150 kcal [Eggs, Toast]");
    }
}
