use crate::cli::ListingCommands;
use crate::support::{
    Context, mutate_or_exit, mutate_reporting_or_exit, principal, print_json, read_or_exit,
};
use biosim_kernel::{Listing, ListingId, TokenType};
use serde_json::{Value, json};

pub fn run(command: ListingCommands, ctx: &Context) {
    match command {
        ListingCommands::Create {
            token_type,
            token_id,
            price,
            caller,
        } => run_create(token_type, token_id, price, caller, ctx),
        ListingCommands::Cancel { id, caller } => run_cancel(ListingId(id), caller, ctx),
        ListingCommands::Buy { id, caller } => run_buy(ListingId(id), caller, ctx),
        ListingCommands::Active => run_active(ctx),
    }
}

fn listing_json(listing: &Listing) -> Value {
    json!({
        "id": listing.id.get(),
        "seller": listing.seller.as_str(),
        "tokenType": listing.token_type.as_str(),
        "tokenId": listing.token_id,
        "price": listing.price,
        "status": listing.status.as_str(),
    })
}

fn run_create(token_type: TokenType, token_id: u64, price: u64, caller: String, ctx: &Context) {
    let seller = principal(&caller);
    let listing = mutate_or_exit(ctx, |sim| {
        let id = sim.create_listing(token_type, token_id, price, &seller);
        sim.listing(id)
            .cloned()
            .ok_or_else(|| biosim_kernel::SimulationError::not_found("listing", id))
    });

    if ctx.json {
        print_json(&json!({
            "action": "listing.create",
            "statePath": ctx.state_display(),
            "listing": listing_json(&listing),
        }));
    } else {
        println!(
            "biosim listing create\n  Listed: #{} {} {} for {}\n  Seller: {}",
            listing.id, listing.token_type, listing.token_id, listing.price, listing.seller
        );
    }
}

fn run_cancel(id: ListingId, caller: String, ctx: &Context) {
    let canceller = principal(&caller);
    let changed = mutate_reporting_or_exit(ctx, |sim| {
        let was_active = sim.listing(id).is_some_and(|l| l.is_active());
        sim.cancel_listing(id, &canceller)?;
        Ok((was_active, was_active))
    });

    if ctx.json {
        print_json(&json!({
            "action": "listing.cancel",
            "statePath": ctx.state_display(),
            "listingId": id.get(),
            "status": "cancelled",
            "changed": changed,
        }));
    } else if changed {
        println!("biosim listing cancel\n  Listing {id}: cancelled");
    } else {
        println!("biosim listing cancel\n  Listing {id}: already cancelled");
    }
}

fn run_buy(id: ListingId, caller: String, ctx: &Context) {
    let buyer = principal(&caller);
    let (listing, buyer_balance, seller_balance) = mutate_or_exit(ctx, |sim| {
        sim.buy_listing(id, &buyer)?;
        let listing = sim
            .listing(id)
            .cloned()
            .ok_or_else(|| biosim_kernel::SimulationError::not_found("listing", id))?;
        let buyer_balance = sim.balance_of(&buyer);
        let seller_balance = sim.balance_of(&listing.seller);
        Ok((listing, buyer_balance, seller_balance))
    });

    if ctx.json {
        print_json(&json!({
            "action": "listing.buy",
            "statePath": ctx.state_display(),
            "listing": listing_json(&listing),
            "buyer": buyer.as_str(),
            "balances": {
                "buyer": buyer_balance,
                "seller": seller_balance,
            }
        }));
    } else {
        println!(
            "biosim listing buy\n  Bought: #{} {} {} for {}\n  Buyer: {buyer} (balance {buyer_balance})\n  Seller: {} (balance {seller_balance})",
            listing.id, listing.token_type, listing.token_id, listing.price, listing.seller
        );
    }
}

fn run_active(ctx: &Context) {
    let listings: Vec<Listing> = read_or_exit(ctx, |sim| sim.active_listings().cloned().collect());

    if ctx.json {
        let items: Vec<Value> = listings.iter().map(listing_json).collect();
        print_json(&json!({
            "action": "listing.active",
            "count": items.len(),
            "items": items,
        }));
    } else {
        println!("biosim listing active");
        if listings.is_empty() {
            println!("  (none)");
        }
        for listing in listings {
            println!(
                "  #{} {} {} for {} by {}",
                listing.id, listing.token_type, listing.token_id, listing.price, listing.seller
            );
        }
    }
}

pub fn run_mint(amount: u64, recipient: String, caller: String, ctx: &Context) {
    let minter = principal(&caller);
    let recipient = principal(&recipient);
    let balance = mutate_or_exit(ctx, |sim| {
        sim.mint_tokens(amount, &recipient, &minter)?;
        Ok(sim.balance_of(&recipient))
    });

    if ctx.json {
        print_json(&json!({
            "action": "tokens.mint",
            "statePath": ctx.state_display(),
            "recipient": recipient.as_str(),
            "amount": amount,
            "balance": balance,
        }));
    } else {
        println!("biosim mint\n  Minted: {amount} to {recipient}\n  Balance: {balance}");
    }
}

pub fn run_balance(raw: String, ctx: &Context) {
    let who = principal(&raw);
    let balance = read_or_exit(ctx, |sim| sim.balance_of(&who));

    if ctx.json {
        print_json(&json!({
            "action": "balance",
            "principal": who.as_str(),
            "balance": balance,
        }));
    } else {
        println!("{who}: {balance}");
    }
}
