//! Пользовательские типы для интеграционных тестов.

#![allow(dead_code)]

use hgraph::{ArrayData, HgraphResult, NdArray, Record, Schema, StatusCode, TypeRegistry, Value};

/// Простой тип с полями по умолчанию.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Unit {
    pub id: i64,
    pub rate: f64,
    pub name: String,
}

impl Record for Unit {
    const TYPE_TAG: &'static str = "Unit";

    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .field(
                "id",
                |u| u.id.into(),
                |u, v| {
                    u.id = v.decode()?;
                    Ok(())
                },
            )
            .field(
                "rate",
                |u| u.rate.into(),
                |u, v| {
                    u.rate = v.decode()?;
                    Ok(())
                },
            )
            .field(
                "name",
                |u| u.name.as_str().into(),
                |u, v| {
                    u.name = v.decode()?;
                    Ok(())
                },
            )
    }
}

/// Составной тип: список объектов, массив и необязательное поле.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub title: String,
    pub units: Vec<Unit>,
    pub grid: Option<NdArray>,
    pub note: Option<String>,
}

impl Record for Scene {
    const TYPE_TAG: &'static str = "Scene";

    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .field(
                "title",
                |s| s.title.as_str().into(),
                |s, v| {
                    s.title = v.decode()?;
                    Ok(())
                },
            )
            .field(
                "units",
                |s| Value::Sequence(s.units.iter().cloned().map(Value::object).collect()),
                |s, v| {
                    let items: Vec<Value> = v.decode()?;
                    s.units = items
                        .into_iter()
                        .map(Value::into_record::<Unit>)
                        .collect::<HgraphResult<Vec<Unit>>>()?;
                    Ok(())
                },
            )
            .field(
                "grid",
                |s| s.grid.clone().into(),
                |s, v| {
                    s.grid = v.decode()?;
                    Ok(())
                },
            )
            .field(
                "note",
                |s| s.note.clone().into(),
                |s, v| {
                    s.note = v.decode()?;
                    Ok(())
                },
            )
    }
}

/// Тип с собственной записью и загрузкой: поля в контейнер не попадают,
/// вместо них пишется одна запись `xy`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Packed {
    pub x: i64,
    pub y: i64,
}

impl Record for Packed {
    const TYPE_TAG: &'static str = "Packed";

    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .field(
                "x",
                |p| p.x.into(),
                |p, v| {
                    p.x = v.decode()?;
                    Ok(())
                },
            )
            .field(
                "y",
                |p| p.y.into(),
                |p, v| {
                    p.y = v.decode()?;
                    Ok(())
                },
            )
            .save_hook(|p, saver, node| saver.save_field(node, "xy", &Value::from(vec![p.x, p.y])))
            .load_hook(|loader, node| {
                let xy: Vec<i64> = loader.load_field(node, "xy")?.decode()?;
                match xy.as_slice() {
                    [x, y] => Ok(Packed { x: *x, y: *y }),
                    _ => hgraph_error::bail!(StatusCode::InvalidData, "xy must hold two values"),
                }
            })
    }
}

/// Тип с post-load хуком: веса нормируются после загрузки.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Weights {
    pub values: Vec<f64>,
    pub normalized: bool,
}

impl Record for Weights {
    const TYPE_TAG: &'static str = "Weights";

    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .field(
                "values",
                |w| w.values.clone().into(),
                |w, v| {
                    w.values = v.decode()?;
                    Ok(())
                },
            )
            .post_load(|w| {
                let total: f64 = w.values.iter().sum();
                if total != 0.0 {
                    w.values.iter_mut().for_each(|x| *x /= total);
                }
                w.normalized = true;
                Ok(())
            })
    }
}

/// Тип, хуки которого отказывают по значению `fail_on`: 1 ломает запись,
/// 2 ломает загрузку.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Faulty {
    pub fail_on: i64,
}

impl Record for Faulty {
    const TYPE_TAG: &'static str = "Faulty";

    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .field(
                "fail_on",
                |f| f.fail_on.into(),
                |f, v| {
                    f.fail_on = v.decode()?;
                    Ok(())
                },
            )
            .save_hook(|f, saver, node| {
                if f.fail_on == 1 {
                    hgraph_error::bail!(StatusCode::InvalidValue, "refusing to save");
                }
                saver.save_field(node, "fail_on", &Value::Int(f.fail_on))
            })
            .load_hook(|loader, node| {
                let fail_on: i64 = loader.load_field(node, "fail_on")?.decode()?;
                if fail_on == 2 {
                    hgraph_error::bail!(StatusCode::InvalidData, "refusing to load");
                }
                Ok(Faulty { fail_on })
            })
    }
}

/// Тип, post-load хук которого отвергает отрицательный счётчик.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Counter {
    pub count: i64,
}

impl Record for Counter {
    const TYPE_TAG: &'static str = "Counter";

    fn schema() -> Schema<Self> {
        Schema::<Self>::new()
            .field(
                "count",
                |c| c.count.into(),
                |c, v| {
                    c.count = v.decode()?;
                    Ok(())
                },
            )
            .post_load(|c| {
                hgraph_error::ensure!(c.count >= 0, StatusCode::InvalidValue, "negative count");
                Ok(())
            })
    }
}

/// Реестр со всеми тестовыми типами.
pub fn registry() -> TypeRegistry {
    TypeRegistry::new()
        .with::<Unit>()
        .and_then(|r| r.with::<Scene>())
        .and_then(|r| r.with::<Packed>())
        .and_then(|r| r.with::<Weights>())
        .and_then(|r| r.with::<Faulty>())
        .and_then(|r| r.with::<Counter>())
        .unwrap()
}

pub fn unit(
    id: i64,
    name: &str,
) -> Unit {
    Unit {
        id,
        rate: id as f64 * 0.5,
        name: name.to_string(),
    }
}

pub fn scene() -> Scene {
    Scene {
        title: "harbour".to_string(),
        units: vec![unit(1, "tug"), unit(2, "barge"), unit(3, "crane")],
        grid: Some(
            NdArray::new(
                vec![2, 3],
                ArrayData::F32(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]),
            )
            .unwrap(),
        ),
        note: None,
    }
}
