use serde::{Serialize, ser::SerializeStruct};

use super::{
    attribute::Attribute,
    error::{ObjectError, ObjectResult},
    map::{AttributeMap, Iter},
    value::Value,
};

/// One resource instance: a type tag plus its attributes, addressed by name
/// without regard to case.
///
/// An entity is owned by a single writer; it provides no internal locking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    type_name: String,
    attributes: AttributeMap,
}

impl Entity {
    /// Create an entity of `type_name` without attributes.
    pub fn build(type_name: impl Into<String>) -> ObjectResult<Self> {
        let type_name = type_name.into();
        if type_name.trim().is_empty() {
            return Err(ObjectError::BlankArgument("type"));
        }
        Ok(Self {
            type_name,
            attributes: AttributeMap::new(),
        })
    }

    /// Create an entity from a non-empty set of attributes.
    pub fn build_with<I>(type_name: impl Into<String>, attributes: I) -> ObjectResult<Self>
    where
        I: IntoIterator<Item = Attribute>,
    {
        let mut entity = Self::build(type_name)?;
        entity.attributes = Self::to_map(attributes);
        if entity.attributes.is_empty() {
            return Err(ObjectError::EmptyValueSet);
        }
        Ok(entity)
    }

    /// Build an entity from a JSON object.
    ///
    /// Top-level arrays become multi-valued attributes; nested objects become
    /// map values. Anything other than an object yields an entity without
    /// attributes.
    pub fn from_json(
        type_name: impl Into<String>,
        object: &serde_json::Value,
    ) -> ObjectResult<Self> {
        let mut entity = Self::build(type_name)?;
        if let Some(fields) = object.as_object() {
            for (name, field) in fields {
                let attribute = match field {
                    serde_json::Value::Array(items) => {
                        Attribute::build_with(name.as_str(), items.iter().cloned().map(Value::from))?
                    }
                    other => Attribute::build_with(name.as_str(), [Value::from(other.clone())])?,
                };
                entity.add(attribute);
            }
        }
        Ok(entity)
    }

    pub fn to_map<I>(attributes: I) -> AttributeMap
    where
        I: IntoIterator<Item = Attribute>,
    {
        Attribute::to_map(attributes)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn contains_value(&self, attribute: &Attribute) -> bool {
        self.attributes.contains_value(attribute)
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn put(&mut self, name: impl Into<String>, attribute: Attribute) -> Option<Attribute> {
        self.attributes.insert(name, attribute)
    }

    pub fn put_all(&mut self, attributes: &AttributeMap) {
        for (name, attribute) in attributes {
            self.attributes.insert(name, attribute.clone());
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        self.attributes.remove(name)
    }

    pub fn clear(&mut self) {
        self.attributes.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub fn iter(&self) -> Iter<'_> {
        self.attributes.iter()
    }

    /// Insert or overwrite `attribute` under its own name.
    pub fn add(&mut self, attribute: Attribute) -> &mut Self {
        self.attributes.put(attribute);
        self
    }

    pub fn add_all<I>(&mut self, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = Attribute>,
    {
        self.attributes.extend(attributes);
        self
    }

    /// Merge the attributes of `other` in, overwriting on name collision.
    pub fn add_entity(&mut self, other: &Entity) -> &mut Self {
        self.add_all(other.attributes().cloned())
    }

    pub fn add_attribute<I, V>(&mut self, name: impl Into<String>, values: I) -> ObjectResult<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let attribute = Attribute::build_with(name, values)?;
        Ok(self.add(attribute))
    }
}

impl<'a> IntoIterator for &'a Entity {
    type Item = (&'a str, &'a Attribute);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for Entity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let attributes: Vec<&Attribute> = self.attributes().collect();
        let mut state = serializer.serialize_struct("Entity", 2)?;
        state.serialize_field("type", &self.type_name)?;
        state.serialize_field("attributes", &attributes)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;

    use super::*;

    fn attr(name: &str, value: &str) -> Attribute {
        Attribute::build_with(name, [value]).unwrap()
    }

    #[test]
    fn test_blank_type_rejected() {
        assert_eq!(
            Entity::build(" ").unwrap_err(),
            ObjectError::BlankArgument("type")
        );
    }

    #[test]
    fn test_build_with_requires_attributes() {
        assert_eq!(
            Entity::build_with("account", Vec::new()).unwrap_err(),
            ObjectError::EmptyValueSet
        );
    }

    #[test]
    fn test_attributes_round_trip() {
        let input = vec![attr("uid", "jdoe"), attr("mail", "jdoe@example.com"), attr("cn", "John")];
        let entity = Entity::build_with("account", input.clone()).unwrap();

        let expected: HashSet<Attribute> = input.into_iter().collect();
        let actual: HashSet<Attribute> = entity.attributes().cloned().collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_case_insensitive_access() {
        let mut entity = Entity::build("account").unwrap();
        entity.add(attr("userPrincipalName", "jdoe@example.com"));
        assert!(entity.contains_key("USERPRINCIPALNAME"));
        assert_eq!(
            entity.get("userprincipalname").unwrap().name(),
            "userPrincipalName"
        );
        assert!(entity.remove("UserPrincipalName").is_some());
        assert!(entity.is_empty());
    }

    #[test]
    fn test_add_overwrites_on_collision() {
        let mut entity = Entity::build("account").unwrap();
        entity.add(attr("status", "Active"));
        entity.add(attr("STATUS", "Revoke"));
        assert_eq!(entity.len(), 1);
        assert_eq!(
            entity.get("status").unwrap().string_value().unwrap(),
            Some("Revoke")
        );
    }

    #[test]
    fn test_add_entity_merges() {
        let mut target = Entity::build_with("account", [attr("uid", "jdoe"), attr("status", "Active")]).unwrap();
        let source = Entity::build_with("account", [attr("status", "Revoke"), attr("mail", "j@example.com")]).unwrap();
        target.add_entity(&source);
        assert_eq!(target.len(), 3);
        assert_eq!(
            target.get("status").unwrap().string_value().unwrap(),
            Some("Revoke")
        );
    }

    #[test]
    fn test_equality_requires_same_type() {
        let a = Entity::build_with("account", [attr("uid", "jdoe")]).unwrap();
        let b = Entity::build_with("account", [attr("UID", "jdoe")]).unwrap();
        let c = Entity::build_with("group", [attr("uid", "jdoe")]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_put_under_alias() {
        let mut entity = Entity::build("account").unwrap();
        entity.put("alias", attr("uid", "jdoe"));
        assert!(entity.contains_key("ALIAS"));
        assert!(!entity.contains_key("uid"));
        assert!(entity.contains_value(&attr("uid", "jdoe")));
        assert_eq!(entity.keys().collect::<Vec<_>>(), vec!["alias"]);
    }

    #[test]
    fn test_from_json() {
        let entity = Entity::from_json(
            "user",
            &json!({
                "userName": "jdoe",
                "active": true,
                "groups": ["admins", "staff"],
                "name": {"givenName": "John", "familyName": "Doe"}
            }),
        )
        .unwrap();

        assert_eq!(entity.type_name(), "user");
        assert_eq!(entity.get("username").unwrap().string_value().unwrap(), Some("jdoe"));
        assert_eq!(entity.get("active").unwrap().boolean_value().unwrap(), Some(true));
        assert_eq!(entity.get("groups").unwrap().values().len(), 2);
        let name = entity.get("name").unwrap().map_value().unwrap().unwrap();
        assert_eq!(name["familyName"], Value::from("Doe"));
    }

    #[test]
    fn test_from_json_rejects_nested_arrays() {
        let result = Entity::from_json("user", &json!({"matrix": [[1, 2], [3]]}));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize() {
        let entity = Entity::build_with("account", [attr("uid", "jdoe")]).unwrap();
        assert_eq!(
            serde_json::to_value(&entity).unwrap(),
            json!({
                "type": "account",
                "attributes": [{"name": "uid", "values": ["jdoe"]}]
            })
        );
    }
}
