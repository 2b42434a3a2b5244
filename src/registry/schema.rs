use hgraph_error::HgraphResult;

use crate::{
    container::NodeId,
    engine::{Loader, Saver},
    model::Value,
};

/// Чтение поля из экземпляра.
pub type Getter<T> = fn(&T) -> Value;
/// Запись загруженного значения в поле экземпляра.
pub type Setter<T> = fn(&mut T, Value) -> HgraphResult<()>;
/// Собственная запись объекта в уже созданный узел (вместо обхода полей).
pub type SaveHook<T> = fn(&T, &mut Saver<'_>, NodeId) -> HgraphResult<()>;
/// Собственная загрузка объекта из узла; результат возвращается как есть.
pub type LoadHook<T> = fn(&mut Loader<'_>, NodeId) -> HgraphResult<T>;
/// Вызывается после того, как все поля установлены.
pub type PostLoadHook<T> = fn(&mut T) -> HgraphResult<()>;

/// Поле схемы: имя + accessor + mutator.
pub struct Field<T> {
    name: &'static str,
    get: Getter<T>,
    set: Setter<T>,
}

/// Дескриптор сериализации типа: упорядоченный список полей и
/// необязательные хуки.
///
/// Порядок полей задаёт порядок обхода при сохранении. Вычисляемые
/// свойства в схему просто не включаются.
pub struct Schema<T> {
    fields: Vec<Field<T>>,
    save_hook: Option<SaveHook<T>>,
    load_hook: Option<LoadHook<T>>,
    post_load: Option<PostLoadHook<T>>,
}

impl<T> Field<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(
        &self,
        record: &T,
    ) -> Value {
        (self.get)(record)
    }

    pub fn set(
        &self,
        record: &mut T,
        value: Value,
    ) -> HgraphResult<()> {
        (self.set)(record, value)
    }
}

impl<T> Schema<T> {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            save_hook: None,
            load_hook: None,
            post_load: None,
        }
    }

    /// Добавляет поле в конец списка.
    pub fn field(
        mut self,
        name: &'static str,
        get: Getter<T>,
        set: Setter<T>,
    ) -> Self {
        self.fields.push(Field { name, get, set });
        self
    }

    pub fn save_hook(
        mut self,
        hook: SaveHook<T>,
    ) -> Self {
        self.save_hook = Some(hook);
        self
    }

    pub fn load_hook(
        mut self,
        hook: LoadHook<T>,
    ) -> Self {
        self.load_hook = Some(hook);
        self
    }

    pub fn post_load(
        mut self,
        hook: PostLoadHook<T>,
    ) -> Self {
        self.post_load = Some(hook);
        self
    }

    pub fn fields(&self) -> &[Field<T>] {
        &self.fields
    }

    pub fn find(
        &self,
        name: &str,
    ) -> Option<&Field<T>> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub(crate) fn get_save_hook(&self) -> Option<SaveHook<T>> {
        self.save_hook
    }

    pub(crate) fn get_load_hook(&self) -> Option<LoadHook<T>> {
        self.load_hook
    }

    pub(crate) fn get_post_load(&self) -> Option<PostLoadHook<T>> {
        self.post_load
    }

    pub fn has_save_hook(&self) -> bool {
        self.save_hook.is_some()
    }

    pub fn has_load_hook(&self) -> bool {
        self.load_hook.is_some()
    }

    pub fn has_post_load(&self) -> bool {
        self.post_load.is_some()
    }
}

impl<T> Default for Schema<T> {
    fn default() -> Self {
        Self::new()
    }
}
