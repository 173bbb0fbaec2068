use crate::{Def, Reflect, ScalarType, Shape, ValueVTable};

macro_rules! impl_scalar {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            unsafe impl Reflect for $ty {
                const SHAPE: &'static Shape = &const {
                    Shape::new::<$ty>(
                        stringify!($ty),
                        Def::Scalar(ScalarType::$variant),
                        &const { ValueVTable::of::<$ty>() },
                    )
                };
            }
        )*
    };
}

impl_scalar! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
    f32 => F32,
    f64 => F64,
    String => String,
}

unsafe impl Reflect for () {
    const SHAPE: &'static Shape =
        &const { Shape::new::<()>("()", Def::Opaque, &const { ValueVTable::of::<()>() }) };
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonplan_testhelpers::test;

    #[test]
    fn scalar_shapes_carry_layout_and_kind() {
        let shape = u16::SHAPE;
        assert_eq!(shape.type_identifier, "u16");
        assert_eq!(shape.layout.size(), 2);
        assert!(shape.is::<u16>());
        assert!(!shape.needs_drop());
        assert!(matches!(shape.def, Def::Scalar(ScalarType::U16)));

        assert!(String::SHAPE.needs_drop());
        assert!(matches!(<()>::SHAPE.def, Def::Opaque));
    }
}
