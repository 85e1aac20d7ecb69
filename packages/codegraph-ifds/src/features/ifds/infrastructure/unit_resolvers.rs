//! Unit resolvers: how methods are partitioned into runners

use crate::features::ifds::domain::IfdsNode;
use crate::features::ifds::ports::UnitResolver;
use std::marker::PhantomData;

/// Methods that expose a dotted qualified name (`pkg.sub.Class.method`)
pub trait QualifiedMethod {
    /// `pkg.sub.Class`
    fn class_name(&self) -> &str;

    /// `pkg.sub`
    fn package_name(&self) -> &str;
}

/// The single unit of a whole-program run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SingletonUnit;

/// Everything in one unit
#[derive(Debug, Clone, Copy, Default)]
pub struct SingletonUnitResolver;

impl<M> UnitResolver<M> for SingletonUnitResolver {
    type Unit = SingletonUnit;

    fn resolve(&self, _method: &M) -> SingletonUnit {
        SingletonUnit
    }
}

/// One unit per method
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodUnitResolver;

impl<M: IfdsNode> UnitResolver<M> for MethodUnitResolver {
    type Unit = M;

    fn resolve(&self, method: &M) -> M {
        method.clone()
    }
}

/// One unit per declaring class
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassUnitResolver;

impl<M: QualifiedMethod> UnitResolver<M> for ClassUnitResolver {
    type Unit = String;

    fn resolve(&self, method: &M) -> String {
        method.class_name().to_string()
    }
}

/// One unit per package
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageUnitResolver;

impl<M: QualifiedMethod> UnitResolver<M> for PackageUnitResolver {
    type Unit = String;

    fn resolve(&self, method: &M) -> String {
        method.package_name().to_string()
    }
}

/// Closure-backed resolver
pub struct FnUnitResolver<M, U, C> {
    resolve: C,
    _marker: PhantomData<fn(&M) -> U>,
}

impl<M, U, C> FnUnitResolver<M, U, C>
where
    C: Fn(&M) -> U,
{
    pub fn new(resolve: C) -> Self {
        Self {
            resolve,
            _marker: PhantomData,
        }
    }
}

impl<M, U, C> UnitResolver<M> for FnUnitResolver<M, U, C>
where
    M: 'static,
    U: IfdsNode,
    C: Fn(&M) -> U + Send + Sync + 'static,
{
    type Unit = U;

    fn resolve(&self, method: &M) -> U {
        (self.resolve)(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Name(&'static str);

    impl QualifiedMethod for Name {
        fn class_name(&self) -> &str {
            self.0.rsplit_once('.').map_or("", |(class, _)| class)
        }

        fn package_name(&self) -> &str {
            let class = self.class_name();
            class.rsplit_once('.').map_or("", |(package, _)| package)
        }
    }

    #[test]
    fn test_resolvers() {
        let method = Name("app.web.Controller.handle");
        assert_eq!(ClassUnitResolver.resolve(&method), "app.web.Controller");
        assert_eq!(PackageUnitResolver.resolve(&method), "app.web");
        assert_eq!(SingletonUnitResolver.resolve(&method), SingletonUnit);
        assert_eq!(MethodUnitResolver.resolve(&"m"), "m");

        let by_length = FnUnitResolver::new(|name: &String| name.len());
        assert_eq!(by_length.resolve(&"abc".to_string()), 3);
    }
}
