use easy_ext::ext;

#[ext(DefaultExt)]
pub impl<T: PartialEq + Default> T {
    fn is_default(&self) -> bool {
        *self == T::default()
    }
}
