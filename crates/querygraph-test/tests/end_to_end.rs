//! End-to-end tests: build queries against the fixture domain, compile them,
//! and run them through a recording session.

use querygraph_core::{ParameterStyle, QueryError, Settings};
use querygraph_engine::{Applicability, Comparison, Direction, Query, Row, Value};
use querygraph_test::fixtures::{registry, Car, Country, Person, Town};
use querygraph_test::{assert_num_queries, RecordingSession};

fn query(registry: &querygraph_engine::MetadataRegistry) -> Query<'_> {
    Query::with_settings(registry, Settings::default())
}

// ============================================================================
// Joins
// ============================================================================

#[test]
fn test_filter_through_reference_joins() {
    let r = registry();
    let mut q = query(&r);
    let person = q.from::<Person>().unwrap();
    let town = q.get(person, "town").unwrap();
    let name = q.get(town, "name").unwrap();
    q.filter(name).unwrap().eq("Paris").unwrap();

    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.text(),
        "from Person hobj1 join hobj1.town hobj2 where hobj2.name = ?"
    );
    assert_eq!(compiled.values(), vec![Value::from("Paris")]);
}

#[test]
fn test_identifier_access_stays_on_the_parent() {
    let r = registry();
    let mut q = query(&r);
    let person = q.from::<Person>().unwrap();
    let town = q.get(person, "town").unwrap();
    let id = q.get(town, "id").unwrap();
    q.select(id).unwrap();

    assert_eq!(q.compile().unwrap().text(), "select hobj1.town.id from Person hobj1");
}

#[test]
fn test_entity_inside_embedded_value_joins_through_path() {
    let r = registry();
    let mut q = query(&r);
    let person = q.from::<Person>().unwrap();
    let address = q.get(person, "address").unwrap();
    let country = q.get(address, "country").unwrap();
    let name = q.get(country, "name").unwrap();
    q.filter(name).unwrap().eq("France").unwrap();

    assert_eq!(
        q.compile().unwrap().text(),
        "from Person hobj1 join hobj1.address.country hobj2 where hobj2.name = ?"
    );
}

#[test]
fn test_identifier_inside_embedded_value_needs_no_join() {
    let r = registry();
    let mut q = query(&r);
    let person = q.from::<Person>().unwrap();
    let address = q.get(person, "address").unwrap();
    let country = q.get(address, "country").unwrap();
    let code = q.get(country, "code").unwrap();
    q.filter(code).unwrap().eq("FR").unwrap();

    assert_eq!(
        q.compile().unwrap().text(),
        "from Person hobj1 where hobj1.address.country.code = ?"
    );
}

#[test]
fn test_mapped_entity_name_is_used_in_from() {
    let r = registry();
    let mut q = query(&r);
    let country = q.from::<Country>().unwrap();
    let name = q.get(country, "name").unwrap();
    q.order_by(name, Direction::Asc).unwrap();

    assert_eq!(
        q.compile().unwrap().text(),
        "from CountryEntity hobj1 order by hobj1.name asc"
    );
}

#[test]
fn test_collection_and_left_join() {
    let r = registry();
    let mut q = query(&r);
    let person = q.from::<Person>().unwrap();
    let cars = q.get(person, "cars").unwrap();
    let model = q.get(cars, "model").unwrap();
    q.filter(model).unwrap().like("Tesla%").unwrap();
    let town = q.get(person, "town").unwrap();
    let town = q.left_join(town).unwrap();
    let mayor = q.get(town, "mayor").unwrap();
    let mayor_name = q.get(mayor, "name").unwrap();
    q.filter(mayor_name).unwrap().is_not_null().unwrap();

    assert_eq!(
        q.compile().unwrap().text(),
        "from Person hobj1 join hobj1.cars hobj2 left join hobj1.town hobj3 \
         join hobj3.mayor hobj4 where hobj2.model like ? and hobj4.name is not null"
    );
}

// ============================================================================
// Restrictions and parameters
// ============================================================================

#[test]
fn test_optional_filters_drop_with_their_parameters() {
    let r = registry();
    let mut q = query(&r);
    let person = q.from::<Person>().unwrap();
    let name = q.get(person, "name").unwrap();
    q.filter(name)
        .unwrap()
        .when(Applicability::NotEmpty)
        .eq("")
        .unwrap();
    let age = q.get(person, "age").unwrap();
    q.filter(age).unwrap().compare(Comparison::Ge, 18).unwrap();

    let compiled = q.compile().unwrap();
    assert_eq!(compiled.text(), "from Person hobj1 where hobj1.age >= ?");
    assert_eq!(compiled.values(), vec![Value::Int(18)]);
}

#[test]
fn test_named_parameters_bound_after_building() {
    let r = registry();
    let settings = Settings {
        parameter_style: ParameterStyle::Named,
        ..Settings::default()
    };
    let mut q = Query::with_settings(&r, settings);
    let town = q.from::<Town>().unwrap();
    let name = q.get(town, "name").unwrap();
    q.filter(name).unwrap().eq_param("town").unwrap();
    q.set_parameter("town", "Lyon");

    let compiled = q.compile().unwrap();
    assert_eq!(compiled.text(), "from Town hobj1 where hobj1.name = :town");
    assert_eq!(compiled.values(), vec![Value::from("Lyon")]);
}

// ============================================================================
// Sub-queries
// ============================================================================

#[test]
fn test_owners_of_expensive_cars() {
    let r = registry();
    let mut q = query(&r);
    let person = q.from::<Person>().unwrap();
    let sub = q
        .subquery(|q| {
            let car = q.from::<Car>()?;
            let owner = q.get(car, "owner")?;
            let owner_id = q.get(owner, "id")?;
            q.select(owner_id)?;
            let price = q.get(car, "price")?;
            q.filter(price)?.gt(10_000.0)
        })
        .unwrap();
    let id = q.get(person, "id").unwrap();
    q.filter(id).unwrap().in_subquery(sub).unwrap();

    let compiled = q.compile().unwrap();
    assert_eq!(
        compiled.text(),
        "from Person hobj1 where hobj1.id in \
         (select hobj2.owner.id from Car hobj2 where hobj2.price > ?)"
    );
    assert_eq!(compiled.values(), vec![Value::Float(10_000.0)]);
}

#[test]
fn test_subquery_root_cannot_leak_into_outer_query() {
    let r = registry();
    let mut q = query(&r);
    q.from::<Person>().unwrap();
    let mut leaked = None;
    q.subquery(|q| {
        leaked = Some(q.from::<Car>()?);
        Ok(())
    })
    .unwrap();

    let car = leaked.unwrap();
    assert!(matches!(q.get(car, "model"), Err(QueryError::OutOfScope { .. })));
}

// ============================================================================
// Execution
// ============================================================================

#[tokio::test]
async fn test_list_runs_one_query_through_the_session() {
    let r = registry();
    let mut q = query(&r);
    let person = q.from::<Person>().unwrap();
    let name = q.get(person, "name").unwrap();
    q.select(name).unwrap();
    let age = q.get(person, "age").unwrap();
    q.filter(age).unwrap().lt(30).unwrap();

    let row = Row::new(vec!["name".into()], vec![Value::from("Alice")]).unwrap();
    let session = RecordingSession::with_rows(vec![row]);

    assert_num_queries(&session, 1, || async {
        let rows = q.list(&session).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<String>("name").unwrap(), "Alice");
    })
    .await;

    let executed = session.executed();
    assert_eq!(
        executed[0].text(),
        "select hobj1.name from Person hobj1 where hobj1.age < ?"
    );
    assert_eq!(executed[0].values(), vec![Value::Int(30)]);
}

#[tokio::test]
async fn test_unique_without_rows_fails() {
    let r = registry();
    let mut q = query(&r);
    q.from::<Town>().unwrap();

    let session = RecordingSession::new();
    assert!(matches!(q.unique(&session).await, Err(QueryError::NoResult(_))));
    assert_eq!(session.last_text().as_deref(), Some("from Town hobj1"));
}
